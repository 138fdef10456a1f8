//! # 文档模型
//!
//! 一份已接收或已生成的文档：序列身份、排序、内容树与派生状态
//! （激活窗口、内容散列、标识注册表）。身份是
//! `(sequenceIdentifier, sequenceNumber)`；只有同一序列内的文档
//! 才可比较，跨序列比较是用法错误而不是某种良定义的排序。

use std::cmp::Ordering;
use std::time::Duration;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, info};

use crate::error::{DocumentError, SemanticError};
use crate::generator::serialize_tree;
use crate::model::{
    ContentElement, ElementKind, ElementNode, ElementTree, RegionElement, StyleElement, TtElement,
};
use crate::parser::parse_document;
use crate::time::{ClockMode, TimeBase};
use crate::validation::{ValidationState, registry::ElementRegistry, validate_tree};

/// 文档的投递方式：滚动序列逐段合并，快照序列整体替换。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum DeliveryMode {
    /// 滚动模式：新文档与现行文档合并出下一个在播状态。
    #[default]
    #[strum(serialize = "rolling")]
    Rolling,
    /// 快照模式：新文档整体取代现行文档。
    #[strum(serialize = "snapshot")]
    Snapshot,
}

/// 一份直播字幕文档。
#[derive(Debug, Clone)]
pub struct Document {
    tree: ElementTree,
    delivery_mode: DeliveryMode,
    availability_time: Option<Duration>,
    state: ValidationState,
    registry: ElementRegistry,
    content_hash: Option<String>,
    resolved_begin: Option<Duration>,
    resolved_end: Option<Duration>,
    end_unbounded: bool,
}

impl Document {
    /// 从标记文本解析并完整校验一份文档。任何失败都不会产出部分文档。
    ///
    /// # Errors
    ///
    /// 语法失败返回 [`DocumentError::Parse`]，语义失败返回
    /// [`DocumentError::Semantic`]。
    pub fn create_from_markup(markup: &str) -> Result<Self, DocumentError> {
        let tree = parse_document(markup)?;
        let mut document = Self::from_tree(tree);
        document.validate()?;
        debug!(
            "文档 {}__{} 接收完成，计算激活窗口: [{:?}; {:?}]",
            document.sequence_identifier(),
            document.sequence_number(),
            document.resolved_begin,
            document.resolved_end,
        );
        Ok(document)
    }

    /// 构造一份带骨架内容树的新文档（创作侧入口）。
    ///
    /// 骨架包含默认样式 `style.default`、默认区域 `region.default`
    /// （原点 `0% 0%`、范围 `100% 100%`）与空的 `body`。
    ///
    /// # Errors
    ///
    /// 给出的时间基准参数组合无法通过语义校验时返回错误
    /// （例如 `smpte` 缺少帧率参数）。
    pub fn new(
        time_base: TimeBase,
        sequence_number: u64,
        sequence_identifier: &str,
        lang: &str,
        clock_mode: Option<ClockMode>,
    ) -> Result<Self, DocumentError> {
        let mut tree = ElementTree::new(ElementKind::Tt(TtElement {
            time_base,
            clock_mode,
            frame_rate: None,
            frame_rate_multiplier: None,
            drop_mode: None,
            marker_mode: None,
            sequence_identifier: sequence_identifier.to_string(),
            sequence_number,
            lang: lang.to_string(),
            extent: None,
            space: None,
        }));
        let head = tree.add_child(tree.root(), ElementKind::Head);
        let styling = tree.add_child(head, ElementKind::Styling);
        tree.add_child(
            styling,
            ElementKind::Style(StyleElement {
                xml_id: "style.default".to_string(),
                ..Default::default()
            }),
        );
        let layout = tree.add_child(head, ElementKind::Layout);
        tree.add_child(
            layout,
            ElementKind::Region(RegionElement {
                xml_id: "region.default".to_string(),
                origin: Some("0% 0%".to_string()),
                extent: Some("100% 100%".to_string()),
                ..Default::default()
            }),
        );
        tree.add_child(tree.root(), ElementKind::Body(ContentElement::default()));

        let mut document = Self::from_tree(tree);
        document.validate()?;
        Ok(document)
    }

    /// 从已建好的树构造未校验的文档。
    pub(crate) fn from_tree(tree: ElementTree) -> Self {
        Self {
            tree,
            delivery_mode: DeliveryMode::default(),
            availability_time: None,
            state: ValidationState::Fresh,
            registry: ElementRegistry::default(),
            content_hash: None,
            resolved_begin: None,
            resolved_end: None,
            end_unbounded: false,
        }
    }

    /// 对文档执行一趟语义校验，建立注册表、激活窗口与内容散列。
    ///
    /// # Errors
    ///
    /// 任一语义规则失败都会中止整趟校验并把文档标记为失败；
    /// 之后规范序列化失败（IO 层）同样视为整体失败。
    pub fn validate(&mut self) -> Result<(), DocumentError> {
        self.state = ValidationState::InTraversal;
        let outcome = match validate_tree(&mut self.tree) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.state = ValidationState::Failed;
                return Err(error.into());
            }
        };
        let canonical = match serialize_tree(&self.tree, false) {
            Ok(canonical) => canonical,
            Err(error) => {
                self.state = ValidationState::Failed;
                return Err(error.into());
            }
        };

        self.registry = outcome.registry;
        self.resolved_begin = outcome.document_begin;
        self.resolved_end = outcome.document_end;
        self.end_unbounded = outcome.document_end_unbounded;
        self.content_hash = Some(hex::encode(Md5::digest(canonical.as_bytes())));
        self.state = ValidationState::Validated;
        info!(
            "文档 {}__{} 语义校验通过",
            self.sequence_identifier(),
            self.sequence_number(),
        );
        Ok(())
    }

    fn root_tt(&self) -> &TtElement {
        match &self.tree.node(self.tree.root()).kind {
            ElementKind::Tt(tt) => tt,
            // 树的构造路径（解析、骨架、合并）都保证根是 tt。
            _ => unreachable!("文档树的根必须是 tt"),
        }
    }

    /// 序列标识。
    #[must_use]
    pub fn sequence_identifier(&self) -> &str {
        &self.root_tt().sequence_identifier
    }

    /// 序列号。
    #[must_use]
    pub fn sequence_number(&self) -> u64 {
        self.root_tt().sequence_number
    }

    /// 时间基准。
    #[must_use]
    pub fn time_base(&self) -> TimeBase {
        self.root_tt().time_base
    }

    /// 文档语言。
    #[must_use]
    pub fn lang(&self) -> &str {
        &self.root_tt().lang
    }

    /// 投递方式。
    #[must_use]
    pub const fn delivery_mode(&self) -> DeliveryMode {
        self.delivery_mode
    }

    /// 设定投递方式。
    pub const fn set_delivery_mode(&mut self, mode: DeliveryMode) {
        self.delivery_mode = mode;
    }

    /// 文档可呈现的挂钟时刻。
    #[must_use]
    pub const fn availability_time(&self) -> Option<Duration> {
        self.availability_time
    }

    /// 设定可呈现时刻。
    pub const fn set_availability_time(&mut self, value: Duration) {
        self.availability_time = Some(value);
    }

    /// 校验状态。
    #[must_use]
    pub const fn validation_state(&self) -> ValidationState {
        self.state
    }

    /// 内容树（只读）。
    #[must_use]
    pub const fn tree(&self) -> &ElementTree {
        &self.tree
    }

    /// 激活窗口起点（最早段落的绝对起点）。
    #[must_use]
    pub const fn resolved_begin_time(&self) -> Option<Duration> {
        self.resolved_begin
    }

    /// 激活窗口终点；存在无界段落时为 `None`。
    #[must_use]
    pub const fn resolved_end_time(&self) -> Option<Duration> {
        if self.end_unbounded { None } else { self.resolved_end }
    }

    /// 规范形式的内容散列（对输入的排版不敏感，对属性与内容敏感）。
    ///
    /// # Errors
    ///
    /// 文档尚未校验时返回 [`SemanticError::ValidationRequired`]。
    pub fn content_hash(&self) -> Result<&str, SemanticError> {
        match (&self.state, &self.content_hash) {
            (ValidationState::Validated, Some(hash)) => Ok(hash),
            _ => Err(SemanticError::ValidationRequired),
        }
    }

    /// 两份文档的内容散列是否一致（重传检测）。未校验的文档不等于任何文档。
    #[must_use]
    pub fn has_same_hash(&self, other: &Self) -> bool {
        match (&self.content_hash, &other.content_hash) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// 按 `xml:id` 查找元素。
    ///
    /// # Errors
    ///
    /// 未校验时返回 [`SemanticError::ValidationRequired`]；
    /// 标识未注册时返回 [`SemanticError::ElementNotFound`]。
    pub fn get_element_by_id(&self, id: &str) -> Result<&ElementNode, SemanticError> {
        if self.state != ValidationState::Validated {
            return Err(SemanticError::ValidationRequired);
        }
        let node = self.registry.lookup(id)?;
        Ok(self.tree.node(node))
    }

    /// 已建成的标识注册表（只读）。
    ///
    /// # Errors
    ///
    /// 未校验时返回 [`SemanticError::ValidationRequired`]。
    pub fn registry(&self) -> Result<&ElementRegistry, SemanticError> {
        if self.state != ValidationState::Validated {
            return Err(SemanticError::ValidationRequired);
        }
        Ok(&self.registry)
    }

    /// 同序列排序比较。同一实例之间恒等。
    ///
    /// # Errors
    ///
    /// 两份文档的 `sequenceIdentifier` 不同时返回
    /// [`SemanticError::SequenceMismatch`]——跨序列的六种关系运算
    /// 与相等性判断都是用法错误。
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, SemanticError> {
        if std::ptr::eq(self, other) {
            return Ok(Ordering::Equal);
        }
        if self.sequence_identifier() != other.sequence_identifier() {
            return Err(SemanticError::SequenceMismatch {
                left: self.sequence_identifier().to_string(),
                right: other.sequence_identifier().to_string(),
            });
        }
        Ok(self.sequence_number().cmp(&other.sequence_number()))
    }

    /// `self < other`。
    ///
    /// # Errors
    /// 见 [`Self::try_cmp`]。
    pub fn try_lt(&self, other: &Self) -> Result<bool, SemanticError> {
        Ok(self.try_cmp(other)? == Ordering::Less)
    }

    /// `self <= other`。
    ///
    /// # Errors
    /// 见 [`Self::try_cmp`]。
    pub fn try_le(&self, other: &Self) -> Result<bool, SemanticError> {
        Ok(self.try_cmp(other)? != Ordering::Greater)
    }

    /// `self > other`。
    ///
    /// # Errors
    /// 见 [`Self::try_cmp`]。
    pub fn try_gt(&self, other: &Self) -> Result<bool, SemanticError> {
        Ok(self.try_cmp(other)? == Ordering::Greater)
    }

    /// `self >= other`。
    ///
    /// # Errors
    /// 见 [`Self::try_cmp`]。
    pub fn try_ge(&self, other: &Self) -> Result<bool, SemanticError> {
        Ok(self.try_cmp(other)? != Ordering::Less)
    }

    /// `self == other`（按序列身份）。
    ///
    /// # Errors
    /// 见 [`Self::try_cmp`]。
    pub fn try_eq(&self, other: &Self) -> Result<bool, SemanticError> {
        Ok(self.try_cmp(other)? == Ordering::Equal)
    }

    /// `self != other`（按序列身份）。
    ///
    /// # Errors
    /// 见 [`Self::try_cmp`]。
    pub fn try_ne(&self, other: &Self) -> Result<bool, SemanticError> {
        Ok(self.try_cmp(other)? != Ordering::Equal)
    }

    /// 规范形式序列化（内容散列基于此形式）。
    ///
    /// # Errors
    ///
    /// 写出失败时返回 [`DocumentError::Parse`]。
    pub fn serialize(&self) -> Result<String, DocumentError> {
        Ok(serialize_tree(&self.tree, false)?)
    }

    /// 两空格缩进的展示形式序列化。
    ///
    /// # Errors
    ///
    /// 写出失败时返回 [`DocumentError::Parse`]。
    pub fn serialize_pretty(&self) -> Result<String, DocumentError> {
        Ok(serialize_tree(&self.tree, true)?)
    }

    /// 与另一份文档相比取值不同的序列关键属性（时间基准、语言、范围）。
    pub(crate) fn incompatible_attributes(&self, other: &Self) -> Vec<&'static str> {
        let mut conflicting = Vec::new();
        if self.time_base() != other.time_base() {
            conflicting.push("timeBase");
        }
        if self.lang() != other.lang() {
            conflicting.push("lang");
        }
        if self.root_tt().extent != other.root_tt().extent {
            conflicting.push("extent");
        }
        conflicting
    }
}
