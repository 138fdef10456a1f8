//! # 语义校验遍历引擎
//!
//! 对文档树做一次深度优先遍历，在固定的阶段调用各元素变体的钩子：
//!
//! 1. `before_validation` —— 与文档上下文无关的结构检查；
//! 2. `before_traversal` —— 压入作用域状态（注册标识、压入时序作用域、
//!    收集并压入可用样式、在根上检查时间基准的属性组合）；
//! 3. 按文档顺序递归子节点；
//! 4. `after_traversal` —— 按严格逆序弹出作用域，并完成需要子孙
//!    处理完毕才能做的收尾（样式链解析、窗口归档）。
//!
//! 复制专用的两个阶段（进入复制前的授权与子树复制后的引用修复）
//! 由合并引擎在同一协议下实现，见 `crate::merge`。
//!
//! 任一钩子失败都会中止整趟校验；上下文随趟丢弃，绝不返回半校验的文档。

pub(crate) mod dataset;
pub mod registry;
mod styles;
pub(crate) mod timing;

use std::time::Duration;

use crate::error::SemanticError;
use crate::model::{ElementKind, ElementTree, NodeId, parse_pixel_extent};
use dataset::{Dataset, TimeContext};
use registry::ElementRegistry;

/// 一趟校验的状态机。只有 `Validated` 状态允许访问
/// `ordered_styles` 与按 ID 查找等派生结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationState {
    /// 尚未校验。
    #[default]
    Fresh,
    /// 校验进行中。
    InTraversal,
    /// 校验成功完成。
    Validated,
    /// 校验失败，文档被拒绝。
    Failed,
}

/// 一趟成功校验的产出。
#[derive(Debug, Default)]
pub(crate) struct ValidationOutcome {
    /// 建成的标识注册表。
    pub registry: ElementRegistry,
    /// 文档激活窗口起点（最早段落的绝对起点）。
    pub document_begin: Option<Duration>,
    /// 文档激活窗口终点（最晚段落的绝对终点）。
    pub document_end: Option<Duration>,
    /// 是否存在终点无界的段落。
    pub document_end_unbounded: bool,
}

/// 对整棵文档树执行一趟语义校验。
pub(crate) fn validate_tree(tree: &mut ElementTree) -> Result<ValidationOutcome, SemanticError> {
    styles::reset_caches(tree);
    let mut ds = Dataset::default();
    validate_subtree(tree, tree.root(), &mut ds)?;
    Ok(ValidationOutcome {
        registry: std::mem::take(&mut ds.registry),
        document_begin: ds.document_begin,
        document_end: ds.document_end,
        document_end_unbounded: ds.document_end_unbounded,
    })
}

fn validate_subtree(
    tree: &mut ElementTree,
    node: NodeId,
    ds: &mut Dataset,
) -> Result<(), SemanticError> {
    before_validation(tree, node, ds)?;
    before_traversal(tree, node, ds)?;
    for child in tree.children(node).to_vec() {
        validate_subtree(tree, child, ds)?;
    }
    after_traversal(tree, node, ds)
}

/// 阶段 1：纯结构检查，不依赖文档上下文。
fn before_validation(
    tree: &ElementTree,
    node: NodeId,
    ds: &Dataset,
) -> Result<(), SemanticError> {
    let kind = &tree.node(node).kind;
    if let ElementKind::Tt(tt) = kind
        && let Some(extent) = &tt.extent
        && parse_pixel_extent(extent).is_none()
    {
        return Err(SemanticError::Structural {
            element: ds.identity_of(kind),
            attribute: "extent",
            detail: format!("'{extent}' 不是 \"<宽>px <高>px\" 形式的像素对"),
        });
    }
    Ok(())
}

/// 阶段 2：压入作用域状态。
fn before_traversal(
    tree: &mut ElementTree,
    node: NodeId,
    ds: &mut Dataset,
) -> Result<(), SemanticError> {
    let identity = ds.identity_of(&tree.node(node).kind);
    match &tree.node(node).kind {
        ElementKind::Tt(tt) => {
            ds.time_context = TimeContext::from_tt(tt);
            ds.has_document_extent = tt.extent.is_some();
            ds.timing_syncbase = Duration::ZERO;
            timing::validate_time_base_attributes(tt, &identity)?;
        }
        ElementKind::Body(_) | ElementKind::Div(_) | ElementKind::P(_) | ElementKind::Span(_) => {
            if let Some(id) = tree.node(node).kind.xml_id().map(str::to_owned) {
                ds.registry.register(&id, node)?;
            }
            timing::preprocess_timing(tree, node, ds)?;
            styles::push_content_styles(tree, node, ds)?;
        }
        ElementKind::Style(style) => {
            let id = style.xml_id.clone();
            check_pixel_usage(
                style.attributes.uses_pixel_units(),
                "fontSize",
                &identity,
                ds,
            )?;
            ds.registry.register(&id, node)?;
        }
        ElementKind::Region(region) => {
            let id = region.xml_id.clone();
            let pixel_placement = region
                .origin
                .as_deref()
                .is_some_and(crate::model::is_pixel_measure)
                || region
                    .extent
                    .as_deref()
                    .is_some_and(crate::model::is_pixel_measure);
            check_pixel_usage(pixel_placement, "origin", &identity, ds)?;
            check_pixel_usage(region.attributes.uses_pixel_units(), "fontSize", &identity, ds)?;
            ds.registry.register(&id, node)?;
            styles::collect_region_styles(tree, node, ds)?;
        }
        ElementKind::Head
        | ElementKind::Styling
        | ElementKind::Layout
        | ElementKind::Br
        | ElementKind::Text(_) => {}
    }
    ds.path.push(tree.node(node).kind.tag_name());
    Ok(())
}

/// 阶段 4：按逆序弹出阶段 2 压入的状态，并做依赖子孙的收尾。
fn after_traversal(
    tree: &mut ElementTree,
    node: NodeId,
    ds: &mut Dataset,
) -> Result<(), SemanticError> {
    ds.path.pop();
    match &tree.node(node).kind {
        ElementKind::Body(_) | ElementKind::Div(_) | ElementKind::P(_) | ElementKind::Span(_) => {
            styles::pop_content_styles(ds);
            timing::postprocess_timing(ds);
        }
        ElementKind::Styling => {
            styles::resolve_styling_chains(tree, node, &ds.registry)?;
        }
        _ => {}
    }
    Ok(())
}

/// 像素单位只有在文档声明了像素范围后才可度量。
fn check_pixel_usage(
    uses_pixels: bool,
    attribute: &'static str,
    identity: &str,
    ds: &Dataset,
) -> Result<(), SemanticError> {
    if uses_pixels && !ds.has_document_extent {
        return Err(SemanticError::Structural {
            element: identity.to_string(),
            attribute,
            detail: "使用像素单位但文档根未声明 tts:extent".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ContentElement, RegionElement, StyleAttributes, StyleElement, TtElement,
    };
    use crate::time::{TimeBase, TimeExpression};

    fn media_root() -> ElementKind {
        ElementKind::Tt(TtElement {
            time_base: TimeBase::Media,
            clock_mode: None,
            frame_rate: None,
            frame_rate_multiplier: None,
            drop_mode: None,
            marker_mode: None,
            sequence_identifier: "testSeq".to_string(),
            sequence_number: 1,
            lang: "en-GB".to_string(),
            extent: None,
            space: None,
        })
    }

    fn offset(secs: u64) -> TimeExpression {
        TimeExpression::Offset(Duration::from_secs(secs))
    }

    fn style(id: &str, refs: &[&str], attributes: StyleAttributes) -> ElementKind {
        ElementKind::Style(StyleElement {
            xml_id: id.to_string(),
            style_refs: refs.iter().map(|s| (*s).to_string()).collect(),
            attributes,
            ordered_styles: None,
        })
    }

    /// tt → head(styling, layout) + body，返回 (树, styling, layout, body)。
    fn scaffold() -> (ElementTree, NodeId, NodeId, NodeId) {
        let mut tree = ElementTree::new(media_root());
        let head = tree.add_child(tree.root(), ElementKind::Head);
        let styling = tree.add_child(head, ElementKind::Styling);
        let layout = tree.add_child(head, ElementKind::Layout);
        let body = tree.add_child(tree.root(), ElementKind::Body(ContentElement::default()));
        (tree, styling, layout, body)
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let (mut tree, _, _, body) = scaffold();
        for _ in 0..2 {
            tree.add_child(
                body,
                ElementKind::P(ContentElement {
                    xml_id: Some("p1".to_string()),
                    ..Default::default()
                }),
            );
        }
        assert!(matches!(
            validate_tree(&mut tree),
            Err(SemanticError::DuplicateId { id }) if id == "p1"
        ));
    }

    #[test]
    fn test_child_window_must_be_inside_container() {
        let (mut tree, _, _, body) = scaffold();
        let div = tree.add_child(
            body,
            ElementKind::Div(ContentElement {
                begin: Some(offset(0)),
                end: Some(offset(10)),
                ..Default::default()
            }),
        );
        tree.add_child(
            div,
            ElementKind::P(ContentElement {
                begin: Some(offset(5)),
                end: Some(offset(3)),
                ..Default::default()
            }),
        );
        assert!(matches!(
            validate_tree(&mut tree),
            Err(SemanticError::TimingInconsistency { .. })
        ));
    }

    #[test]
    fn test_child_end_exceeding_container_is_reported() {
        let (mut tree, _, _, body) = scaffold();
        let div = tree.add_child(
            body,
            ElementKind::Div(ContentElement {
                end: Some(offset(10)),
                ..Default::default()
            }),
        );
        tree.add_child(
            div,
            ElementKind::P(ContentElement {
                begin: Some(offset(2)),
                end: Some(offset(12)),
                ..Default::default()
            }),
        );
        assert!(matches!(
            validate_tree(&mut tree),
            Err(SemanticError::TimingInconsistency { .. })
        ));
    }

    #[test]
    fn test_child_without_end_inherits_container_end() {
        let (mut tree, _, _, body) = scaffold();
        let div = tree.add_child(
            body,
            ElementKind::Div(ContentElement {
                end: Some(offset(10)),
                ..Default::default()
            }),
        );
        let p = tree.add_child(
            div,
            ElementKind::P(ContentElement {
                begin: Some(offset(2)),
                ..Default::default()
            }),
        );
        let outcome = validate_tree(&mut tree).unwrap();
        let content = tree.node(p).kind.content().unwrap();
        assert_eq!(content.resolved_begin, Some(Duration::from_secs(2)));
        assert_eq!(content.resolved_end, Some(Duration::from_secs(10)));
        assert_eq!(outcome.document_begin, Some(Duration::from_secs(2)));
        assert_eq!(outcome.document_end, Some(Duration::from_secs(10)));
        assert!(!outcome.document_end_unbounded);
    }

    #[test]
    fn test_nested_begins_accumulate_against_syncbase() {
        let (mut tree, _, _, body) = scaffold();
        let div = tree.add_child(
            body,
            ElementKind::Div(ContentElement {
                begin: Some(offset(10)),
                ..Default::default()
            }),
        );
        let p = tree.add_child(
            div,
            ElementKind::P(ContentElement {
                begin: Some(offset(5)),
                dur: Some(offset(3)),
                ..Default::default()
            }),
        );
        validate_tree(&mut tree).unwrap();
        let content = tree.node(p).kind.content().unwrap();
        assert_eq!(content.resolved_begin, Some(Duration::from_secs(15)));
        assert_eq!(content.resolved_end, Some(Duration::from_secs(18)));
    }

    #[test]
    fn test_end_and_dur_are_mutually_exclusive() {
        let (mut tree, _, _, body) = scaffold();
        tree.add_child(
            body,
            ElementKind::P(ContentElement {
                begin: Some(offset(1)),
                end: Some(offset(2)),
                dur: Some(offset(1)),
                ..Default::default()
            }),
        );
        assert!(matches!(
            validate_tree(&mut tree),
            Err(SemanticError::InvalidAttributes { attributes, .. })
                if attributes == vec!["end", "dur"]
        ));
    }

    #[test]
    fn test_style_cycle_is_detected() {
        let (mut tree, styling, _, _) = scaffold();
        tree.add_child(styling, style("a", &["b"], StyleAttributes::default()));
        tree.add_child(styling, style("b", &["a"], StyleAttributes::default()));
        assert!(matches!(
            validate_tree(&mut tree),
            Err(SemanticError::CircularStyleReference { .. })
        ));
    }

    #[test]
    fn test_missing_style_reference_names_the_id() {
        let (mut tree, styling, _, _) = scaffold();
        tree.add_child(styling, style("a", &["ghost"], StyleAttributes::default()));
        assert!(matches!(
            validate_tree(&mut tree),
            Err(SemanticError::StyleNotFound { style, .. }) if style == "ghost"
        ));
    }

    #[test]
    fn test_ordered_styles_self_first_first_reference_wins() {
        let (mut tree, styling, _, _) = scaffold();
        let a = tree.add_child(styling, style("a", &["b", "c"], StyleAttributes::default()));
        let b = tree.add_child(styling, style("b", &["c"], StyleAttributes::default()));
        let c = tree.add_child(styling, style("c", &[], StyleAttributes::default()));
        validate_tree(&mut tree).unwrap();
        let chain = tree
            .node(a)
            .kind
            .as_style()
            .unwrap()
            .ordered_styles
            .clone()
            .unwrap();
        assert_eq!(chain, vec![a, b, c]);
    }

    #[test]
    fn test_region_reference_must_resolve() {
        let (mut tree, _, _, body) = scaffold();
        tree.add_child(
            body,
            ElementKind::P(ContentElement {
                region_ref: Some("r9".to_string()),
                ..Default::default()
            }),
        );
        assert!(matches!(
            validate_tree(&mut tree),
            Err(SemanticError::RegionNotFound { region, .. }) if region == "r9"
        ));
    }

    #[test]
    fn test_effective_style_layering() {
        let (mut tree, styling, layout, body) = scaffold();
        tree.add_child(
            styling,
            style(
                "direct",
                &[],
                StyleAttributes {
                    color: Some("#ff0000".to_string()),
                    ..Default::default()
                },
            ),
        );
        tree.add_child(
            styling,
            style(
                "ancestor",
                &[],
                StyleAttributes {
                    color: Some("#00ff00".to_string()),
                    font_family: Some("monospaceSansSerif".to_string()),
                    ..Default::default()
                },
            ),
        );
        tree.add_child(
            styling,
            style(
                "regional",
                &[],
                StyleAttributes {
                    text_align: Some("center".to_string()),
                    font_family: Some("proportionalSansSerif".to_string()),
                    ..Default::default()
                },
            ),
        );
        tree.add_child(
            layout,
            ElementKind::Region(RegionElement {
                xml_id: "r1".to_string(),
                style_refs: vec!["regional".to_string()],
                ..Default::default()
            }),
        );
        let div = tree.add_child(
            body,
            ElementKind::Div(ContentElement {
                style_refs: vec!["ancestor".to_string()],
                ..Default::default()
            }),
        );
        let p = tree.add_child(
            div,
            ElementKind::P(ContentElement {
                style_refs: vec!["direct".to_string()],
                region_ref: Some("r1".to_string()),
                ..Default::default()
            }),
        );
        validate_tree(&mut tree).unwrap();

        let computed = tree
            .node(p)
            .kind
            .content()
            .unwrap()
            .computed_style
            .clone()
            .unwrap();
        // 直接引用压过祖先，祖先压过区域，区域补齐缺口。
        assert_eq!(computed.color.as_deref(), Some("#ff0000"));
        assert_eq!(computed.font_family.as_deref(), Some("monospaceSansSerif"));
        assert_eq!(computed.text_align.as_deref(), Some("center"));
    }

    #[test]
    fn test_pixel_styles_require_document_extent() {
        let (mut tree, styling, _, _) = scaffold();
        tree.add_child(
            styling,
            style(
                "px",
                &[],
                StyleAttributes {
                    font_size: Some("16px".to_string()),
                    ..Default::default()
                },
            ),
        );
        assert!(matches!(
            validate_tree(&mut tree),
            Err(SemanticError::Structural { attribute: "fontSize", .. })
        ));

        // 根上声明了像素范围后同一棵树通过。
        if let ElementKind::Tt(tt) = &mut tree.node_mut(tree.root()).kind {
            tt.extent = Some("544px 288px".to_string());
        }
        assert!(validate_tree(&mut tree).is_ok());
    }

    #[test]
    fn test_malformed_root_extent_is_structural() {
        let (mut tree, _, _, _) = scaffold();
        if let ElementKind::Tt(tt) = &mut tree.node_mut(tree.root()).kind {
            tt.extent = Some("100% 100%".to_string());
        }
        assert!(matches!(
            validate_tree(&mut tree),
            Err(SemanticError::Structural { attribute: "extent", .. })
        ));
    }

    #[test]
    fn test_unbounded_paragraph_marks_document_window() {
        let (mut tree, _, _, body) = scaffold();
        tree.add_child(
            body,
            ElementKind::P(ContentElement {
                begin: Some(offset(3)),
                ..Default::default()
            }),
        );
        let outcome = validate_tree(&mut tree).unwrap();
        assert_eq!(outcome.document_begin, Some(Duration::from_secs(3)));
        assert!(outcome.document_end_unbounded);
    }

    #[test]
    fn test_revalidation_resets_caches() {
        let (mut tree, styling, _, body) = scaffold();
        let a = tree.add_child(styling, style("a", &[], StyleAttributes::default()));
        tree.add_child(
            body,
            ElementKind::P(ContentElement {
                xml_id: Some("p1".to_string()),
                style_refs: vec!["a".to_string()],
                ..Default::default()
            }),
        );
        validate_tree(&mut tree).unwrap();
        let first = tree.node(a).kind.as_style().unwrap().ordered_styles.clone();
        // 第二趟从干净缓存重建，结果一致。
        let outcome = validate_tree(&mut tree).unwrap();
        let second = tree.node(a).kind.as_style().unwrap().ordered_styles.clone();
        assert_eq!(first, second);
        assert!(outcome.registry.contains("p1"));
    }
}
