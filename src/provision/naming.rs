//! 命名规则
//!
//! 纯函数，不做任何 I/O：
//! - 日期文件夹名（固定时区，与部署地区和主机时区无关）
//! - 从任意字符串派生的安全名称（如表格文件名 → 文件夹名）
//! - 年/月文件夹名

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// 日期文件夹格式：DD-MM-YYYY
pub const DAY_FOLDER_FORMAT: &str = "%d-%m-%Y";

/// 扩展名最大长度（超过视为名称的一部分）
const MAX_EXTENSION_LEN: usize = 10;

/// 时钟抽象
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定时钟（测试用）
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// 当前日期在固定时区下的文件夹名
///
/// 同一民用日内多次调用结果相同，与主机本地时区无关
pub fn day_folder_name(clock: &dyn Clock, timezone: Tz) -> String {
    clock
        .now()
        .with_timezone(&timezone)
        .format(DAY_FOLDER_FORMAT)
        .to_string()
}

/// 年文件夹名
pub fn year_folder_name(year: i32) -> String {
    year.to_string()
}

/// 月文件夹名（两位数字），月份非法时返回 None
pub fn month_folder_name(month: u32) -> Option<String> {
    (1..=12).contains(&month).then(|| format!("{:02}", month))
}

/// 从任意字符串派生安全名称
///
/// 1. 去掉末尾扩展名
/// 2. `[A-Za-z0-9 _-]` 以外的字符视为分隔符
/// 3. 连续空白合并为一个下划线
/// 4. 去掉首尾的下划线和连字符（连字符只允许出现在名称内部，`-draft-` → `draft`）
///
/// 对任何输入都有结果（可能为空字符串），且幂等
pub fn sanitize_name(raw: &str) -> String {
    let stem = strip_extension(raw);

    let spaced: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect();

    spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .trim_matches(|c| c == '_' || c == '-')
        .to_string()
}

/// 去掉末尾扩展名（`.` 不在开头，且扩展名为 1..=10 个 ASCII 字母数字）
fn strip_extension(raw: &str) -> &str {
    let trimmed = raw.trim_end();
    match trimmed.rfind('.') {
        Some(pos) if pos > 0 => {
            let ext = &trimmed[pos + 1..];
            if !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
            {
                &trimmed[..pos]
            } else {
                trimmed
            }
        }
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn madrid() -> Tz {
        "Europe/Madrid".parse().unwrap()
    }

    #[test]
    fn test_day_folder_name_uses_fixed_timezone() {
        // 2025-03-31 23:30 UTC 在马德里已经是 4 月 1 日
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 3, 31, 23, 30, 0).unwrap());
        assert_eq!(day_folder_name(&clock, madrid()), "01-04-2025");
        assert_eq!(day_folder_name(&clock, Tz::UTC), "31-03-2025");
    }

    #[test]
    fn test_day_folder_name_stable_within_day() {
        let morning = FixedClock(Utc.with_ymd_and_hms(2025, 7, 14, 0, 5, 0).unwrap());
        let evening = FixedClock(Utc.with_ymd_and_hms(2025, 7, 14, 21, 55, 0).unwrap());
        assert_eq!(
            day_folder_name(&morning, madrid()),
            day_folder_name(&evening, madrid())
        );
    }

    #[test]
    fn test_month_folder_name() {
        assert_eq!(month_folder_name(3).as_deref(), Some("03"));
        assert_eq!(month_folder_name(12).as_deref(), Some("12"));
        assert_eq!(month_folder_name(0), None);
        assert_eq!(month_folder_name(13), None);
        assert_eq!(year_folder_name(2025), "2025");
    }

    #[test]
    fn test_sanitize_examples() {
        assert_eq!(sanitize_name("Informe Q1 (2025).xlsx"), "Informe_Q1_2025");
        assert_eq!(sanitize_name("  a/b:c  "), "a_b_c");
        assert_eq!(sanitize_name("compras-intrastat_marzo.csv"), "compras-intrastat_marzo");
        assert_eq!(sanitize_name("v1.2 final.docx"), "v1_2_final");
        assert_eq!(sanitize_name(".env"), "env");
        assert_eq!(sanitize_name("???"), "");
        assert_eq!(sanitize_name(""), "");
    }

    #[test]
    fn test_sanitize_trims_edge_hyphens_only() {
        assert_eq!(sanitize_name("-draft-"), "draft");
        assert_eq!(sanitize_name("_-borrador-_.pdf"), "borrador");
        assert_eq!(sanitize_name("pre-cierre"), "pre-cierre");
    }

    #[test]
    fn test_sanitize_keeps_long_suffix() {
        // 超长“扩展名”不是扩展名
        assert_eq!(sanitize_name("acta.reunionextraordinaria"), "acta_reunionextraordinaria");
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(raw in ".*") {
            let once = sanitize_name(&raw);
            prop_assert_eq!(sanitize_name(&once), once);
        }

        #[test]
        fn prop_sanitize_charset(raw in ".*") {
            let out = sanitize_name(&raw);
            prop_assert!(out
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
            prop_assert!(!out.starts_with(['_', '-']) && !out.ends_with(['_', '-']));
        }
    }
}
