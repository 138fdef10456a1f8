//! # 内容主体的写出
//!
//! `body` 子树按文档顺序递归写出。时序属性用解析前的原始表达式
//! 形式写出（`Display` 形式是其规范化拼写），文本在写出时转义。

use quick_xml::{Writer, events::BytesText};

use crate::model::{ContentElement, ElementKind, ElementTree, NodeId};

pub(super) fn write_body<W: std::io::Write>(
    writer: &mut Writer<W>,
    tree: &ElementTree,
    body: NodeId,
) -> std::io::Result<()> {
    write_content(writer, tree, body)
}

fn write_content<W: std::io::Write>(
    writer: &mut Writer<W>,
    tree: &ElementTree,
    node: NodeId,
) -> std::io::Result<()> {
    let kind = &tree.node(node).kind;
    let Some(content) = kind.content() else {
        return Ok(());
    };
    let attrs = content_attributes(content);

    let mut element_writer = writer.create_element(kind.tag_name());
    for (key, value) in &attrs {
        element_writer = element_writer.with_attribute((*key, value.as_str()));
    }

    let children = tree.children(node);
    if children.is_empty() {
        element_writer.write_empty()?;
        return Ok(());
    }

    element_writer.write_inner_content(|writer| {
        for &child in children {
            match &tree.node(child).kind {
                ElementKind::Div(_) | ElementKind::P(_) | ElementKind::Span(_) => {
                    write_content(writer, tree, child)?;
                }
                ElementKind::Br => {
                    writer.create_element("br").write_empty()?;
                }
                ElementKind::Text(text) => {
                    writer.write_event(quick_xml::events::Event::Text(BytesText::new(text)))?;
                }
                _ => {}
            }
        }
        Ok::<(), std::io::Error>(())
    })?;
    Ok(())
}

/// 内容元素属性的固定写出顺序。
fn content_attributes(content: &ContentElement) -> Vec<(&'static str, String)> {
    let mut attrs: Vec<(&'static str, String)> = Vec::new();
    if let Some(id) = &content.xml_id {
        attrs.push(("xml:id", id.clone()));
    }
    if let Some(begin) = content.begin {
        attrs.push(("begin", begin.to_string()));
    }
    if let Some(end) = content.end {
        attrs.push(("end", end.to_string()));
    }
    if let Some(dur) = content.dur {
        attrs.push(("dur", dur.to_string()));
    }
    if !content.style_refs.is_empty() {
        attrs.push(("style", content.style_refs.join(" ")));
    }
    if let Some(region) = &content.region_ref {
        attrs.push(("region", region.clone()));
    }
    if let Some(lang) = &content.lang {
        attrs.push(("xml:lang", lang.clone()));
    }
    if let Some(space) = content.space {
        attrs.push(("xml:space", space.to_string()));
    }
    attrs
}
