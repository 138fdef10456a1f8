//! # 样式级联解析
//!
//! 样式的 `style` 属性是按声明顺序排列的多重引用。解析结果是
//! 去重后的有序链：自身在前，随后依次展开每个引用自己的链，
//! 首次出现优先（就近优先级）。链缓存在样式节点上，按趟失效；
//! 循环引用用一个趟内的"解析中"集合检测，任何退出路径都不会遗留标记。

use std::collections::HashSet;

use crate::error::SemanticError;
use crate::model::{ElementKind, ElementTree, NodeId, StyleAttributes};
use crate::validation::dataset::Dataset;
use crate::validation::registry::ElementRegistry;

/// 清空上一趟校验留下的缓存。两棵结构相似但不同的树绝不能共享链缓存。
pub(super) fn reset_caches(tree: &mut ElementTree) {
    for id in tree.node_ids().collect::<Vec<_>>() {
        match &mut tree.node_mut(id).kind {
            ElementKind::Style(style) => style.ordered_styles = None,
            ElementKind::Region(region) => region.applicable_styles = None,
            kind => {
                if let Some(content) = kind.content_mut() {
                    content.resolved_begin = None;
                    content.resolved_end = None;
                    content.computed_style = None;
                }
            }
        }
    }
}

/// styling 容器遍历完成后，解析其中每个样式的继承链并写入缓存。
pub(super) fn resolve_styling_chains(
    tree: &mut ElementTree,
    styling: NodeId,
    registry: &ElementRegistry,
) -> Result<(), SemanticError> {
    let mut in_progress = HashSet::new();
    for child in tree.children(styling).to_vec() {
        if matches!(tree.node(child).kind, ElementKind::Style(_)) {
            resolve_chain(tree, child, registry, &mut in_progress)?;
        }
    }
    Ok(())
}

/// 深度优先展开一个样式的继承链，带备忘缓存与重入检测。
fn resolve_chain(
    tree: &mut ElementTree,
    style: NodeId,
    registry: &ElementRegistry,
    in_progress: &mut HashSet<NodeId>,
) -> Result<Vec<NodeId>, SemanticError> {
    let Some(element) = tree.node(style).kind.as_style() else {
        return Ok(Vec::new());
    };
    if let Some(cached) = &element.ordered_styles {
        return Ok(cached.clone());
    }
    let style_id = element.xml_id.clone();
    let refs = element.style_refs.clone();

    if !in_progress.insert(style) {
        return Err(SemanticError::CircularStyleReference { style: style_id });
    }

    let mut chain = vec![style];
    for ref_id in refs {
        let target = registry
            .lookup_expecting(tree, &ref_id, |k| matches!(k, ElementKind::Style(_)))
            .map_err(|_| SemanticError::StyleNotFound {
                element: format!("style#{style_id}"),
                style: ref_id.clone(),
            })?;
        for node in resolve_chain(tree, target, registry, in_progress)? {
            if !chain.contains(&node) {
                chain.push(node);
            }
        }
    }

    in_progress.remove(&style);
    if let Some(element) = tree.node_mut(style).kind.as_style_mut() {
        element.ordered_styles = Some(chain.clone());
    }
    Ok(chain)
}

/// 区域进入时收集其可用样式：直接引用的样式连同各自已缓存的链。
pub(super) fn collect_region_styles(
    tree: &mut ElementTree,
    node: NodeId,
    ds: &Dataset,
) -> Result<(), SemanticError> {
    let identity = ds.identity_of(&tree.node(node).kind);
    let Some(region) = tree.node(node).kind.as_region() else {
        return Ok(());
    };
    let refs = region.style_refs.clone();

    let mut applicable = Vec::new();
    for ref_id in &refs {
        let target = ds
            .registry
            .lookup_expecting(tree, ref_id, |k| matches!(k, ElementKind::Style(_)))
            .map_err(|_| SemanticError::StyleNotFound {
                element: identity.clone(),
                style: ref_id.clone(),
            })?;
        for chained in expanded_chain(tree, target) {
            if !applicable.contains(&chained) {
                applicable.push(chained);
            }
        }
    }

    if let ElementKind::Region(region) = &mut tree.node_mut(node).kind {
        region.applicable_styles = Some(applicable);
    }
    Ok(())
}

/// 内容元素进入时：解析直接引用、核对区域引用、
/// 计算有效样式（直接引用 ≻ 祖先作用域 ≻ 区域默认）并压入样式作用域。
pub(super) fn push_content_styles(
    tree: &mut ElementTree,
    node: NodeId,
    ds: &mut Dataset,
) -> Result<(), SemanticError> {
    let identity = ds.identity_of(&tree.node(node).kind);
    let Some(content) = tree.node(node).kind.content() else {
        return Ok(());
    };
    let style_refs = content.style_refs.clone();
    let region_ref = content.region_ref.clone();

    let mut direct = Vec::new();
    for ref_id in &style_refs {
        let target = ds
            .registry
            .lookup_expecting(tree, ref_id, |k| matches!(k, ElementKind::Style(_)))
            .map_err(|_| SemanticError::StyleNotFound {
                element: identity.clone(),
                style: ref_id.clone(),
            })?;
        for chained in expanded_chain(tree, target) {
            if !direct.contains(&chained) {
                direct.push(chained);
            }
        }
    }

    let region_styles = match &region_ref {
        Some(region_id) => {
            let region = ds
                .registry
                .lookup_expecting(tree, region_id, |k| matches!(k, ElementKind::Region(_)))
                .map_err(|_| SemanticError::RegionNotFound {
                    element: identity.clone(),
                    region: region_id.clone(),
                })?;
            tree.node(region)
                .kind
                .as_region()
                .and_then(|r| r.applicable_styles.clone())
                .unwrap_or_default()
        }
        None => Vec::new(),
    };

    let mut effective = StyleAttributes::default();
    apply_layer(tree, &direct, &mut effective);
    for scope in ds.styles_stack.iter().rev() {
        apply_layer(tree, scope, &mut effective);
    }
    apply_layer(tree, &region_styles, &mut effective);

    if let Some(content) = tree.node_mut(node).kind.content_mut() {
        content.computed_style = Some(effective);
    }
    ds.styles_stack.push(direct);
    Ok(())
}

/// 内容元素离开时弹出样式作用域，与 [`push_content_styles`] 成对。
pub(super) fn pop_content_styles(ds: &mut Dataset) {
    ds.styles_stack.pop();
}

/// 样式节点已缓存的链；缓存缺失时退化为仅自身。
fn expanded_chain(tree: &ElementTree, style: NodeId) -> Vec<NodeId> {
    tree.node(style)
        .kind
        .as_style()
        .and_then(|s| s.ordered_styles.clone())
        .unwrap_or_else(|| vec![style])
}

/// 把一层样式按顺序并入有效样式，只填充尚未设置的属性。
fn apply_layer(tree: &ElementTree, layer: &[NodeId], effective: &mut StyleAttributes) {
    for &node in layer {
        if let Some(style) = tree.node(node).kind.as_style() {
            effective.merge_missing_from(&style.attributes);
        }
    }
}
