//! 文件夹树构建
//!
//! 按声明式的树描述一次性创建多级文件夹结构：
//! - 深度优先、先序：先创建节点自身，再按给定顺序处理子节点
//! - 节点直接创建（不做查找），重复调用会得到重复的树
//! - 使用显式栈遍历，深层嵌套不会耗尽调用栈
//! - 中途失败不回滚，错误中携带已创建的部分

use crate::error::FieldError;
use crate::netdisk::{RemoteFolder, RemoteStore, RemoteStoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// 树描述的最大深度
pub const MAX_TREE_DEPTH: usize = 32;

/// 文件夹树节点描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderTreeSpec {
    pub name: String,
    #[serde(default)]
    pub children: Vec<FolderTreeSpec>,
}

impl FolderTreeSpec {
    /// 叶子节点
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// 带子节点的节点
    pub fn node(name: impl Into<String>, children: Vec<FolderTreeSpec>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    /// 节点总数
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// 校验：名称非空、深度不超过上限
    ///
    /// 字段路径形如 `tree.children[1].children[0].name`
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let mut stack = vec![(self, "tree".to_string(), 1usize)];

        while let Some((node, path, depth)) = stack.pop() {
            if node.name.trim().is_empty() {
                errors.push(FieldError::new(format!("{}.name", path), "文件夹名称不能为空"));
            }
            if depth > MAX_TREE_DEPTH {
                errors.push(FieldError::new(
                    path.clone(),
                    format!("层级超过上限 {}", MAX_TREE_DEPTH),
                ));
                continue;
            }
            for (i, child) in node.children.iter().enumerate().rev() {
                stack.push((child, format!("{}.children[{}]", path, i), depth + 1));
            }
        }

        errors
    }
}

/// 构建结果
#[derive(Debug, Clone, Serialize)]
pub struct BuiltTree {
    /// 顶层节点对应的文件夹 id
    pub root_id: String,
    /// 按创建顺序（先序）排列的全部文件夹
    pub folders: Vec<RemoteFolder>,
}

/// 构建中途失败
#[derive(Debug, Error)]
#[error("创建文件夹树失败: 节点 '{failed_at}' 创建出错 (已创建 {} 个): {source}", .created.len())]
pub struct TreeBuildError {
    /// 出错的节点名称
    pub failed_at: String,
    /// 失败前已经创建的文件夹
    pub created: Vec<RemoteFolder>,
    pub source: RemoteStoreError,
}

/// 文件夹树构建器
pub struct FolderTreeBuilder {
    store: Arc<dyn RemoteStore>,
}

impl FolderTreeBuilder {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// 在 `root_parent_id` 下创建 `spec` 描述的整棵树
    pub async fn build_tree(
        &self,
        spec: &FolderTreeSpec,
        root_parent_id: &str,
    ) -> Result<BuiltTree, TreeBuildError> {
        info!(
            "开始创建文件夹树: root={}, parent={}, 节点数={}",
            spec.name,
            root_parent_id,
            spec.node_count()
        );

        let mut created: Vec<RemoteFolder> = Vec::new();
        let mut stack: Vec<(&FolderTreeSpec, String)> = vec![(spec, root_parent_id.to_string())];

        while let Some((node, parent_id)) = stack.pop() {
            let name = node.name.trim();
            let folder = match self.store.create_folder(name, &parent_id).await {
                Ok(folder) => folder,
                Err(source) => {
                    warn!(
                        "创建文件夹树中断: node={}, parent={}, 已创建 {} 个, 错误: {}",
                        name,
                        parent_id,
                        created.len(),
                        source
                    );
                    return Err(TreeBuildError {
                        failed_at: name.to_string(),
                        created,
                        source,
                    });
                }
            };

            // 逆序入栈，保证子节点按给定顺序出栈
            for child in node.children.iter().rev() {
                stack.push((child, folder.id.clone()));
            }
            created.push(folder);
        }

        let root_id = created
            .first()
            .map(|f| f.id.clone())
            .unwrap_or_default();

        info!(
            "文件夹树创建完成: root={}, id={}, 共 {} 个文件夹",
            spec.name,
            root_id,
            created.len()
        );

        Ok(BuiltTree {
            root_id,
            folders: created,
        })
    }
}
