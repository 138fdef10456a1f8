//! # 分段合并引擎
//!
//! 滚动投递模式下，用现行文档的主体与新到文档的主体合成下一个
//! 在播状态。合并表达为"带去冲突的子树复制"：与普通校验同一套
//! 遍历协议，只是多了两个复制专属阶段——进入复制前的授权
//! （被复制的元素必须落在声明的受影响子树内），以及子树复制完成后的
//! 修复（按改名表重写 ID 引用、核对样式与区域引用仍可解析、
//! 为脱离了原时序祖先链的复制件落盘绝对时间）。
//!
//! 合并产物作为整体重新校验，合并后的 `body` 自身不携带任何时序声明。

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::document::Document;
use crate::error::{DocumentError, SemanticError};
use crate::model::{ContentElement, ElementKind, ElementTree, NodeId};
use crate::validation::dataset::TimeContext;
use crate::validation::timing::expression_from_duration;

/// 合并后文档的统一标识空间，按变体分类以便核对引用。
#[derive(Debug, Default)]
struct IdSpace {
    all: HashSet<String>,
    styles: HashSet<String>,
    regions: HashSet<String>,
}

impl IdSpace {
    fn insert(&mut self, id: &str, kind: &ElementKind) {
        self.all.insert(id.to_string());
        match kind {
            ElementKind::Style(_) => {
                self.styles.insert(id.to_string());
            }
            ElementKind::Region(_) => {
                self.regions.insert(id.to_string());
            }
            _ => {}
        }
    }

    /// 为冲突的标识挑选确定性的新名字：依次尝试 `.1`、`.2`……直到空闲。
    fn deconflict(&self, base: &str) -> String {
        let mut suffix = 1u32;
        loop {
            let candidate = format!("{base}.{suffix}");
            if !self.all.contains(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// 单个来源文档的复制操作：受影响子树、以及本来源内发生的改名。
struct SubtreeCopier<'a> {
    src: &'a ElementTree,
    affected: HashSet<NodeId>,
    renames: HashMap<String, String>,
    time_context: TimeContext,
}

impl<'a> SubtreeCopier<'a> {
    /// `affected_roots` 声明本次合并允许触及的来源子树。
    fn new(src: &'a ElementTree, affected_roots: &[NodeId], time_context: TimeContext) -> Self {
        let mut affected = HashSet::new();
        for &root in affected_roots {
            affected.extend(src.descendants(root));
        }
        Self {
            src,
            affected,
            renames: HashMap::new(),
            time_context,
        }
    }

    /// 深度复制一棵来源子树到目标树，后序去冲突标识。
    fn copy_subtree(
        &mut self,
        dest: &mut ElementTree,
        src_node: NodeId,
        dest_parent: NodeId,
        ids: &mut IdSpace,
    ) -> Result<NodeId, SemanticError> {
        // 复制授权：越过声明的受影响子树即错误。
        if !self.affected.contains(&src_node) {
            return Err(SemanticError::OutsideAffectedSubset {
                element: self.src.node(src_node).kind.identity(),
            });
        }

        let mut kind = self.src.node(src_node).kind.clone();
        strip_pass_state(&mut kind);
        let dest_node = dest.add_child(dest_parent, kind);

        for child in self.src.children(src_node).to_vec() {
            self.copy_subtree(dest, child, dest_node, ids)?;
        }

        // 后序去冲突：子孙处理完后再决定自己的标识。
        if let Some(id) = dest.node(dest_node).kind.xml_id().map(str::to_owned) {
            if ids.all.contains(&id) {
                let renamed = ids.deconflict(&id);
                dest.node_mut(dest_node).kind.set_xml_id(renamed.clone());
                ids.insert(&renamed, &dest.node(dest_node).kind);
                self.renames.insert(id, renamed);
            } else {
                ids.insert(&id, &dest.node(dest_node).kind);
            }
        }
        Ok(dest_node)
    }

    /// 子树复制完成后的修复：重写改名的引用、核对引用、落盘绝对时间。
    fn after_subtree_copy(
        &self,
        dest: &mut ElementTree,
        copied_root: NodeId,
        src_root: NodeId,
        ids: &IdSpace,
        stamp_resolved_timing: bool,
    ) -> Result<(), SemanticError> {
        for node in dest.descendants(copied_root) {
            self.rewrite_references(dest, node)?;
            verify_references(dest, node, ids)?;
        }
        if stamp_resolved_timing {
            self.stamp_resolved_timing(dest, copied_root, src_root);
        }
        Ok(())
    }

    /// 把本来源内被改名的 ID 引用替换为新名字。
    fn rewrite_references(
        &self,
        dest: &mut ElementTree,
        node: NodeId,
    ) -> Result<(), SemanticError> {
        let kind = &mut dest.node_mut(node).kind;
        let refs: Option<&mut Vec<String>> = match kind {
            ElementKind::Style(s) => Some(&mut s.style_refs),
            ElementKind::Region(r) => Some(&mut r.style_refs),
            other => other.content_mut().map(|c| &mut c.style_refs),
        };
        if let Some(refs) = refs {
            for reference in refs.iter_mut() {
                if let Some(renamed) = self.renames.get(reference) {
                    *reference = renamed.clone();
                }
            }
        }
        if let Some(content) = dest.node_mut(node).kind.content_mut()
            && let Some(region) = &content.region_ref
            && let Some(renamed) = self.renames.get(region)
        {
            content.region_ref = Some(renamed.clone());
        }
        Ok(())
    }

    /// 复制件脱离了原时序祖先链：把来源上解析出的绝对窗口写回声明属性。
    fn stamp_resolved_timing(&self, dest: &mut ElementTree, copied_root: NodeId, src_root: NodeId) {
        let Some(src_content) = self.src.node(src_root).kind.content() else {
            return;
        };
        let (resolved_begin, resolved_end) = (src_content.resolved_begin, src_content.resolved_end);
        let Some(content) = dest.node_mut(copied_root).kind.content_mut() else {
            return;
        };
        if let Some(begin) = resolved_begin {
            content.begin = Some(expression_from_duration(begin, &self.time_context));
        }
        content.end = resolved_end.map(|end| expression_from_duration(end, &self.time_context));
        content.dur = None;
    }
}

/// 清除复制件上携带的趟内派生状态；合并产物会整体重新校验。
fn strip_pass_state(kind: &mut ElementKind) {
    match kind {
        ElementKind::Style(s) => s.ordered_styles = None,
        ElementKind::Region(r) => r.applicable_styles = None,
        other => {
            if let Some(content) = other.content_mut() {
                content.resolved_begin = None;
                content.resolved_end = None;
                content.computed_style = None;
            }
        }
    }
}

/// 复制件携带的每个样式、区域引用都必须在合并后的标识空间内可解析。
fn verify_references(
    dest: &ElementTree,
    node: NodeId,
    ids: &IdSpace,
) -> Result<(), SemanticError> {
    let kind = &dest.node(node).kind;
    let identity = kind.identity();
    let refs = match kind {
        ElementKind::Style(s) => Some(&s.style_refs),
        ElementKind::Region(r) => Some(&r.style_refs),
        other => other.content().map(|c| &c.style_refs),
    };
    if let Some(refs) = refs {
        for reference in refs {
            if !ids.styles.contains(reference) {
                return Err(SemanticError::StyleNotFound {
                    element: identity,
                    style: reference.clone(),
                });
            }
        }
    }
    if let Some(content) = kind.content()
        && let Some(region) = &content.region_ref
        && !ids.regions.contains(region)
    {
        return Err(SemanticError::RegionNotFound {
            element: identity,
            region: region.clone(),
        });
    }
    Ok(())
}

/// 在来源树中定位 head 下的 styling/layout 与根下的 body。
fn locate_sections(tree: &ElementTree) -> (Option<NodeId>, Option<NodeId>, Option<NodeId>) {
    let head = tree.child_matching(tree.root(), |k| matches!(k, ElementKind::Head));
    let styling =
        head.and_then(|h| tree.child_matching(h, |k| matches!(k, ElementKind::Styling)));
    let layout = head.and_then(|h| tree.child_matching(h, |k| matches!(k, ElementKind::Layout)));
    let body = tree.child_matching(tree.root(), |k| matches!(k, ElementKind::Body(_)));
    (styling, layout, body)
}

/// 把现行文档的主体与新到文档的主体合并为下一份文档。
///
/// 两份文档都必须已通过校验且属于同一序列；时间基准、语言或文档范围
/// 不一致的文档按当前策略拒绝合并（见 [`SemanticError::DocumentNotCompatible`]）。
///
/// # Errors
///
/// 序列不符返回 [`SemanticError::SequenceMismatch`]；关键属性冲突返回
/// [`SemanticError::DocumentNotCompatible`]；复制修复或合并产物的
/// 重新校验失败时返回相应的语义错误。
pub fn merge_documents(active: &Document, incoming: &Document) -> Result<Document, DocumentError> {
    use crate::validation::ValidationState;
    if active.validation_state() != ValidationState::Validated
        || incoming.validation_state() != ValidationState::Validated
    {
        return Err(SemanticError::ValidationRequired.into());
    }
    if active.sequence_identifier() != incoming.sequence_identifier() {
        return Err(SemanticError::SequenceMismatch {
            left: active.sequence_identifier().to_string(),
            right: incoming.sequence_identifier().to_string(),
        }
        .into());
    }
    let conflicting = active.incompatible_attributes(incoming);
    if !conflicting.is_empty() {
        return Err(SemanticError::DocumentNotCompatible {
            attributes: conflicting,
        }
        .into());
    }

    let incoming_tt = incoming
        .tree()
        .node(incoming.tree().root())
        .kind
        .clone();
    let mut dest = ElementTree::new(incoming_tt);
    let head = dest.add_child(dest.root(), ElementKind::Head);
    let dest_styling = dest.add_child(head, ElementKind::Styling);
    let dest_layout = dest.add_child(head, ElementKind::Layout);
    // 合并后的容器不携带自己的时序声明，子孙各自保留。
    let dest_body = dest.add_child(dest.root(), ElementKind::Body(ContentElement::default()));

    let (active_styling, active_layout, active_body) = locate_sections(active.tree());
    let (incoming_styling, incoming_layout, incoming_body) = locate_sections(incoming.tree());

    let active_roots: Vec<NodeId> = [active_styling, active_layout, active_body]
        .into_iter()
        .flatten()
        .collect();
    let incoming_roots: Vec<NodeId> = [incoming_styling, incoming_layout, incoming_body]
        .into_iter()
        .flatten()
        .collect();

    let time_context = TimeContext::from_tt(
        incoming
            .tree()
            .node(incoming.tree().root())
            .kind
            .as_tt()
            .ok_or(SemanticError::ValidationRequired)?,
    );
    let mut active_copier = SubtreeCopier::new(active.tree(), &active_roots, time_context);
    let mut incoming_copier = SubtreeCopier::new(incoming.tree(), &incoming_roots, time_context);
    let mut ids = IdSpace::default();

    // 先并入现行文档的样式、区域与主体，再并入新到文档的（冲突者加后缀）。
    // 每一侧先完成全部复制，改名表齐备后再统一做子树复制后的修复，
    // 否则同一来源内靠前的引用会看不到靠后元素的改名。
    // body 层的复制件成为新容器的直接子节点，失去原容器的时序继承，
    // 因此在修复阶段落盘解析出的绝对时间。
    for (copier, styling, layout, body) in [
        (&mut active_copier, active_styling, active_layout, active_body),
        (
            &mut incoming_copier,
            incoming_styling,
            incoming_layout,
            incoming_body,
        ),
    ] {
        let mut copies: Vec<(NodeId, NodeId, bool)> = Vec::new();
        for (container, dest_container, stamp_timing) in [
            (styling, dest_styling, false),
            (layout, dest_layout, false),
            (body, dest_body, true),
        ] {
            if let Some(container) = container {
                for child in copier.src.children(container).to_vec() {
                    let copied = copier.copy_subtree(&mut dest, child, dest_container, &mut ids)?;
                    copies.push((copied, child, stamp_timing));
                }
            }
        }
        for (copied, src_root, stamp_timing) in copies {
            copier.after_subtree_copy(&mut dest, copied, src_root, &ids, stamp_timing)?;
        }
    }

    let mut merged = Document::from_tree(dest);
    merged.set_delivery_mode(incoming.delivery_mode());
    if let Some(availability) = incoming.availability_time() {
        merged.set_availability_time(availability);
    }
    merged.validate()?;
    debug!(
        "文档 {}__{} 合并完成，共 {} 个标识",
        merged.sequence_identifier(),
        merged.sequence_number(),
        ids.all.len(),
    );
    Ok(merged)
}
