//! # 标识注册表
//!
//! 每个文档一张 `xml:id` 到节点的映射，在遍历过程中增量建立，
//! 注册即查重。校验完成后随文档只读暴露，供下游按 ID 解析引用。

use std::collections::HashMap;

use crate::error::SemanticError;
use crate::model::{ElementKind, ElementTree, NodeId};

/// 单个文档的 `xml:id` 注册表。
#[derive(Debug, Clone, Default)]
pub struct ElementRegistry {
    by_id: HashMap<String, NodeId>,
}

impl ElementRegistry {
    /// 注册一个标识。同一文档内重复注册是语义错误。
    pub fn register(&mut self, id: &str, node: NodeId) -> Result<(), SemanticError> {
        if self.by_id.contains_key(id) {
            return Err(SemanticError::DuplicateId { id: id.to_string() });
        }
        self.by_id.insert(id.to_string(), node);
        Ok(())
    }

    /// 按标识查找节点。
    pub fn lookup(&self, id: &str) -> Result<NodeId, SemanticError> {
        self.by_id
            .get(id)
            .copied()
            .ok_or_else(|| SemanticError::ElementNotFound { id: id.to_string() })
    }

    /// 按标识查找节点，并要求命中给定的变体。
    /// 未注册或变体不符都按查找失败处理。
    pub fn lookup_expecting(
        &self,
        tree: &ElementTree,
        id: &str,
        expected: impl Fn(&ElementKind) -> bool,
    ) -> Result<NodeId, SemanticError> {
        let node = self.lookup(id)?;
        if expected(&tree.node(node).kind) {
            Ok(node)
        } else {
            Err(SemanticError::ElementNotFound { id: id.to_string() })
        }
    }

    /// 标识是否已注册。
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// 已注册的标识数量。
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// 注册表是否为空。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
