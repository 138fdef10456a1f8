//! # 文档头的写出
//!
//! `head` 部分包含样式容器与布局容器。样式与区域都是空元素，
//! 属性按固定顺序写出。

use quick_xml::Writer;

use crate::model::{ElementKind, ElementTree, NodeId, RegionElement, StyleAttributes, StyleElement};

pub(super) fn write_head<W: std::io::Write>(
    writer: &mut Writer<W>,
    tree: &ElementTree,
    head: NodeId,
) -> std::io::Result<()> {
    let children = tree.children(head);
    if children.is_empty() {
        writer.create_element("head").write_empty()?;
        return Ok(());
    }
    writer.create_element("head").write_inner_content(|writer| {
        for &child in children {
            match &tree.node(child).kind {
                ElementKind::Styling => write_styling(writer, tree, child)?,
                ElementKind::Layout => write_layout(writer, tree, child)?,
                _ => {}
            }
        }
        Ok::<(), std::io::Error>(())
    })?;
    Ok(())
}

fn write_styling<W: std::io::Write>(
    writer: &mut Writer<W>,
    tree: &ElementTree,
    styling: NodeId,
) -> std::io::Result<()> {
    let children = tree.children(styling);
    if children.is_empty() {
        writer.create_element("styling").write_empty()?;
        return Ok(());
    }
    writer
        .create_element("styling")
        .write_inner_content(|writer| {
            for &child in children {
                if let ElementKind::Style(style) = &tree.node(child).kind {
                    write_style(writer, style)?;
                }
            }
            Ok::<(), std::io::Error>(())
        })?;
    Ok(())
}

fn write_layout<W: std::io::Write>(
    writer: &mut Writer<W>,
    tree: &ElementTree,
    layout: NodeId,
) -> std::io::Result<()> {
    let children = tree.children(layout);
    if children.is_empty() {
        writer.create_element("layout").write_empty()?;
        return Ok(());
    }
    writer
        .create_element("layout")
        .write_inner_content(|writer| {
            for &child in children {
                if let ElementKind::Region(region) = &tree.node(child).kind {
                    write_region(writer, region)?;
                }
            }
            Ok::<(), std::io::Error>(())
        })?;
    Ok(())
}

fn write_style<W: std::io::Write>(
    writer: &mut Writer<W>,
    style: &StyleElement,
) -> std::io::Result<()> {
    let mut attrs: Vec<(&'static str, String)> = vec![("xml:id", style.xml_id.clone())];
    if !style.style_refs.is_empty() {
        attrs.push(("style", style.style_refs.join(" ")));
    }
    push_style_attributes(&mut attrs, &style.attributes);

    let mut element_writer = writer.create_element("style");
    for (key, value) in &attrs {
        element_writer = element_writer.with_attribute((*key, value.as_str()));
    }
    element_writer.write_empty()?;
    Ok(())
}

fn write_region<W: std::io::Write>(
    writer: &mut Writer<W>,
    region: &RegionElement,
) -> std::io::Result<()> {
    let mut attrs: Vec<(&'static str, String)> = vec![("xml:id", region.xml_id.clone())];
    if !region.style_refs.is_empty() {
        attrs.push(("style", region.style_refs.join(" ")));
    }
    if let Some(origin) = &region.origin {
        attrs.push(("tts:origin", origin.clone()));
    }
    if let Some(extent) = &region.extent {
        attrs.push(("tts:extent", extent.clone()));
    }
    push_style_attributes(&mut attrs, &region.attributes);

    let mut element_writer = writer.create_element("region");
    for (key, value) in &attrs {
        element_writer = element_writer.with_attribute((*key, value.as_str()));
    }
    element_writer.write_empty()?;
    Ok(())
}

/// 呈现属性的固定写出顺序。
pub(super) fn push_style_attributes(
    attrs: &mut Vec<(&'static str, String)>,
    attributes: &StyleAttributes,
) {
    let pairs = [
        ("tts:color", &attributes.color),
        ("tts:backgroundColor", &attributes.background_color),
        ("tts:fontFamily", &attributes.font_family),
        ("tts:fontSize", &attributes.font_size),
        ("tts:lineHeight", &attributes.line_height),
        ("tts:textAlign", &attributes.text_align),
        ("tts:wrapOption", &attributes.wrap_option),
    ];
    for (key, value) in pairs {
        if let Some(value) = value {
            attrs.push((key, value.clone()));
        }
    }
}
