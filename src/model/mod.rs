//! # 文档树数据模型
//!
//! 元素树采用索引竞技场：节点由 [`NodeId`] 寻址，子节点由父节点独占持有，
//! 样式、区域之间的交叉引用一律以 `xml:id` 字符串表示，经标识注册表解析，
//! 从不直接持有节点链接。这样样式之间任意的引用图都不会形成所有权环。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::time::{
    ClockMode, DropMode, FrameRateMultiplier, MarkerMode, TimeBase, TimeExpression,
};

/// 竞技场内节点的索引句柄。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// `xml:space` 属性。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, Serialize, Deserialize)]
pub enum XmlSpace {
    /// 默认空白处理。
    #[default]
    #[strum(serialize = "default")]
    Default,
    /// 保留空白。
    #[strum(serialize = "preserve")]
    Preserve,
}

/// 样式属性集合：档案支持的一小组闭合的呈现属性，取值保留为原始字符串。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleAttributes {
    /// 前景色（`tts:color`）。
    pub color: Option<String>,
    /// 背景色（`tts:backgroundColor`）。
    pub background_color: Option<String>,
    /// 字体族（`tts:fontFamily`）。
    pub font_family: Option<String>,
    /// 字号（`tts:fontSize`）。
    pub font_size: Option<String>,
    /// 行高（`tts:lineHeight`）。
    pub line_height: Option<String>,
    /// 对齐方式（`tts:textAlign`）。
    pub text_align: Option<String>,
    /// 换行策略（`tts:wrapOption`）。
    pub wrap_option: Option<String>,
}

macro_rules! fill_missing {
    ($dst:expr, $src:expr, $($field:ident),+) => {
        $(
            if $dst.$field.is_none() {
                $dst.$field = $src.$field.clone();
            }
        )+
    };
}

impl StyleAttributes {
    /// 用另一层样式填充本层尚未设置的属性。已设置的属性保持不变，
    /// 因此按优先级从高到低依次调用即可得到分层合并结果。
    pub fn merge_missing_from(&mut self, other: &Self) {
        fill_missing!(
            self,
            other,
            color,
            background_color,
            font_family,
            font_size,
            line_height,
            text_align,
            wrap_option
        );
    }

    /// 字号或行高是否使用了像素单位。
    #[must_use]
    pub fn uses_pixel_units(&self) -> bool {
        let pixel = |v: &Option<String>| v.as_deref().is_some_and(is_pixel_measure);
        pixel(&self.font_size) || pixel(&self.line_height)
    }
}

/// 判断一个长度值（可能是以空格分隔的多个分量）是否含像素分量。
#[must_use]
pub fn is_pixel_measure(value: &str) -> bool {
    value
        .split_ascii_whitespace()
        .any(|part| part.ends_with("px"))
}

/// 校验 `"<width>px <height>px"` 形式的文档范围属性。
#[must_use]
pub fn parse_pixel_extent(value: &str) -> Option<(u32, u32)> {
    let mut parts = value.split_ascii_whitespace();
    let (Some(w), Some(h), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    let width = w.strip_suffix("px")?.parse().ok()?;
    let height = h.strip_suffix("px")?.parse().ok()?;
    Some((width, height))
}

/// 文档根元素的属性。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtElement {
    /// 时间基准（`ttp:timeBase`）。
    pub time_base: TimeBase,
    /// 挂钟参照系（`ttp:clockMode`），仅 `timeBase="clock"` 时出现。
    pub clock_mode: Option<ClockMode>,
    /// 标称帧率（`ttp:frameRate`），仅 `timeBase="smpte"` 时出现。
    pub frame_rate: Option<u32>,
    /// 帧率修正因子（`ttp:frameRateMultiplier`）。
    pub frame_rate_multiplier: Option<FrameRateMultiplier>,
    /// 丢帧模式（`ttp:dropMode`），仅 `timeBase="smpte"` 时出现。
    pub drop_mode: Option<DropMode>,
    /// 标记模式（`ttp:markerMode`），仅 `timeBase="smpte"` 时出现。
    pub marker_mode: Option<MarkerMode>,
    /// 序列标识（`ttp:sequenceIdentifier`）。
    pub sequence_identifier: String,
    /// 序列号（`ttp:sequenceNumber`）。
    pub sequence_number: u64,
    /// 文档语言（`xml:lang`）。
    pub lang: String,
    /// 文档范围（`tts:extent`），必须是像素对。
    pub extent: Option<String>,
    /// 空白处理（`xml:space`）。
    pub space: Option<XmlSpace>,
}

/// 时序内容元素（`body`/`div`/`p`/`span`）共享的属性。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentElement {
    /// 元素标识（`xml:id`）。
    pub xml_id: Option<String>,
    /// 声明的起始时间。
    pub begin: Option<TimeExpression>,
    /// 声明的结束时间。与 `dur` 互斥。
    pub end: Option<TimeExpression>,
    /// 声明的持续时长。与 `end` 互斥。
    pub dur: Option<TimeExpression>,
    /// 引用的样式 ID，按声明顺序。
    pub style_refs: Vec<String>,
    /// 引用的区域 ID。
    pub region_ref: Option<String>,
    /// 语言（`xml:lang`）。
    pub lang: Option<String>,
    /// 空白处理（`xml:space`）。
    pub space: Option<XmlSpace>,
    /// 校验得出的绝对激活起点。
    pub resolved_begin: Option<Duration>,
    /// 校验得出的绝对激活终点；`None` 表示无界（继承容器终点失败时也为空）。
    pub resolved_end: Option<Duration>,
    /// 校验得出的分层合并样式（直接引用 ≻ 祖先 ≻ 区域）。
    pub computed_style: Option<StyleAttributes>,
}

/// 样式定义元素。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleElement {
    /// 样式标识（`xml:id`），必需。
    pub xml_id: String,
    /// 继承的样式 ID，按声明顺序。
    pub style_refs: Vec<String>,
    /// 本样式声明的属性。
    pub attributes: StyleAttributes,
    /// 缓存的解析继承链（自身在前，首次出现优先）。
    /// 仅在所属文档的 styling 容器完成一轮校验后有效，
    /// 每轮新的校验开始时都会被清空。
    pub ordered_styles: Option<Vec<NodeId>>,
}

/// 区域定义元素。区域之间不允许相互引用，因此没有级联。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionElement {
    /// 区域标识（`xml:id`），必需。
    pub xml_id: String,
    /// 引用的样式 ID，按声明顺序。
    pub style_refs: Vec<String>,
    /// 区域原点（`tts:origin`）。
    pub origin: Option<String>,
    /// 区域范围（`tts:extent`）。
    pub extent: Option<String>,
    /// 本区域直接声明的属性。
    pub attributes: StyleAttributes,
    /// 遍历期间收集的可用样式（直接引用的样式节点）。
    pub applicable_styles: Option<Vec<NodeId>>,
}

/// 元素变体的闭合集合。每个变体携带其专属属性。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    /// 文档根。
    Tt(TtElement),
    /// 文档头。
    Head,
    /// 样式容器。
    Styling,
    /// 布局容器。
    Layout,
    /// 样式定义。
    Style(StyleElement),
    /// 区域定义。
    Region(RegionElement),
    /// 内容主体。
    Body(ContentElement),
    /// 内容分组。
    Div(ContentElement),
    /// 段落。
    P(ContentElement),
    /// 行内片段。
    Span(ContentElement),
    /// 强制换行。
    Br,
    /// 文本内容。
    Text(String),
}

impl ElementKind {
    /// 元素的标签名。
    #[must_use]
    pub const fn tag_name(&self) -> &'static str {
        match self {
            Self::Tt(_) => "tt",
            Self::Head => "head",
            Self::Styling => "styling",
            Self::Layout => "layout",
            Self::Style(_) => "style",
            Self::Region(_) => "region",
            Self::Body(_) => "body",
            Self::Div(_) => "div",
            Self::P(_) => "p",
            Self::Span(_) => "span",
            Self::Br => "br",
            Self::Text(_) => "#text",
        }
    }

    /// 元素携带的 `xml:id`（如果有）。
    #[must_use]
    pub fn xml_id(&self) -> Option<&str> {
        match self {
            Self::Style(s) => Some(&s.xml_id),
            Self::Region(r) => Some(&r.xml_id),
            Self::Body(c) | Self::Div(c) | Self::P(c) | Self::Span(c) => c.xml_id.as_deref(),
            _ => None,
        }
    }

    /// 改写元素的 `xml:id`（合并去冲突时使用）。对不可标识的变体是空操作。
    pub fn set_xml_id(&mut self, id: String) {
        match self {
            Self::Style(s) => s.xml_id = id,
            Self::Region(r) => r.xml_id = id,
            Self::Body(c) | Self::Div(c) | Self::P(c) | Self::Span(c) => c.xml_id = Some(id),
            _ => {}
        }
    }

    /// 用于错误报告的元素标识：有 `xml:id` 时为 `tag#id`，否则为标签名。
    #[must_use]
    pub fn identity(&self) -> String {
        match self.xml_id() {
            Some(id) => format!("{}#{id}", self.tag_name()),
            None => self.tag_name().to_string(),
        }
    }

    /// 是否是时序内容元素。
    #[must_use]
    pub const fn is_timed(&self) -> bool {
        matches!(
            self,
            Self::Body(_) | Self::Div(_) | Self::P(_) | Self::Span(_)
        )
    }

    /// 以内容元素视角访问。
    #[must_use]
    pub const fn content(&self) -> Option<&ContentElement> {
        match self {
            Self::Body(c) | Self::Div(c) | Self::P(c) | Self::Span(c) => Some(c),
            _ => None,
        }
    }

    /// 以内容元素视角可变访问。
    pub const fn content_mut(&mut self) -> Option<&mut ContentElement> {
        match self {
            Self::Body(c) | Self::Div(c) | Self::P(c) | Self::Span(c) => Some(c),
            _ => None,
        }
    }

    /// 以样式定义视角访问。
    #[must_use]
    pub const fn as_style(&self) -> Option<&StyleElement> {
        match self {
            Self::Style(s) => Some(s),
            _ => None,
        }
    }

    /// 以样式定义视角可变访问。
    pub const fn as_style_mut(&mut self) -> Option<&mut StyleElement> {
        match self {
            Self::Style(s) => Some(s),
            _ => None,
        }
    }

    /// 以区域定义视角访问。
    #[must_use]
    pub const fn as_region(&self) -> Option<&RegionElement> {
        match self {
            Self::Region(r) => Some(r),
            _ => None,
        }
    }

    /// 以文档根视角访问。
    #[must_use]
    pub const fn as_tt(&self) -> Option<&TtElement> {
        match self {
            Self::Tt(t) => Some(t),
            _ => None,
        }
    }
}

/// 树中的一个节点：变体数据加子节点列表。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    /// 变体数据。
    pub kind: ElementKind,
    /// 子节点，按文档顺序。
    pub children: Vec<NodeId>,
}

/// 以竞技场存储的有根有序元素树。根节点始终位于索引 0。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTree {
    nodes: Vec<ElementNode>,
}

impl ElementTree {
    /// 以给定的根变体建立新树。
    #[must_use]
    pub fn new(root: ElementKind) -> Self {
        Self {
            nodes: vec![ElementNode {
                kind: root,
                children: Vec::new(),
            }],
        }
    }

    /// 根节点句柄。
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// 新建游离节点，返回其句柄。
    pub fn add_node(&mut self, kind: ElementKind) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(ElementNode {
            kind,
            children: Vec::new(),
        });
        id
    }

    /// 新建节点并挂到父节点末尾。
    pub fn add_child(&mut self, parent: NodeId, kind: ElementKind) -> NodeId {
        let id = self.add_node(kind);
        self.attach(parent, id);
        id
    }

    /// 将已有节点挂到父节点末尾。
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.index()].children.push(child);
    }

    /// 访问节点。
    #[must_use]
    pub fn node(&self, id: NodeId) -> &ElementNode {
        &self.nodes[id.index()]
    }

    /// 可变访问节点。
    pub fn node_mut(&mut self, id: NodeId) -> &mut ElementNode {
        &mut self.nodes[id.index()]
    }

    /// 节点的子节点列表。
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// 树中的节点总数。
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 树是否为空（竞技场建树后恒为假，保留以配合 `len`）。
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 查找第一个满足条件的直接子节点。
    #[must_use]
    pub fn child_matching(
        &self,
        parent: NodeId,
        predicate: impl Fn(&ElementKind) -> bool,
    ) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| predicate(&self.node(c).kind))
    }

    /// 按竞技场顺序遍历所有节点句柄。
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..u32::try_from(self.nodes.len()).unwrap_or(u32::MAX)).map(NodeId)
    }

    /// 前序收集以 `id` 为根的整棵子树（含自身）。
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            // 倒序压栈保持文档顺序出栈。
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_attributes_merge_keeps_set_fields() {
        let mut upper = StyleAttributes {
            color: Some("#ffffff".to_string()),
            ..Default::default()
        };
        let lower = StyleAttributes {
            color: Some("#000000".to_string()),
            font_size: Some("100%".to_string()),
            ..Default::default()
        };
        upper.merge_missing_from(&lower);
        assert_eq!(upper.color.as_deref(), Some("#ffffff"));
        assert_eq!(upper.font_size.as_deref(), Some("100%"));
    }

    #[test]
    fn test_pixel_measure_detection() {
        assert!(is_pixel_measure("16px"));
        assert!(is_pixel_measure("10% 24px"));
        assert!(!is_pixel_measure("100% 100%"));
        assert_eq!(parse_pixel_extent("544px 288px"), Some((544, 288)));
        assert_eq!(parse_pixel_extent("100% 100%"), None);
        assert_eq!(parse_pixel_extent("544px"), None);
    }

    #[test]
    fn test_tree_construction_and_descendants() {
        let mut tree = ElementTree::new(ElementKind::Head);
        let styling = tree.add_child(tree.root(), ElementKind::Styling);
        let style = tree.add_child(
            styling,
            ElementKind::Style(StyleElement {
                xml_id: "s1".to_string(),
                ..Default::default()
            }),
        );
        let layout = tree.add_child(tree.root(), ElementKind::Layout);

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.children(tree.root()), &[styling, layout]);
        assert_eq!(tree.descendants(tree.root()), vec![tree.root(), styling, style, layout]);
        assert_eq!(tree.node(style).kind.identity(), "style#s1");
        assert_eq!(
            tree.child_matching(tree.root(), |k| matches!(k, ElementKind::Layout)),
            Some(layout)
        );
    }
}
