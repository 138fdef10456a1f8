//! # 规范序列化
//!
//! 把类型化的文档树写回标记文本。命名空间前缀绑定是固定的，
//! 根元素总是写作 `tt`（与内存中的变体无关），属性按固定顺序写出，
//! 因此同一棵树的规范形式字节稳定，可以直接用于内容散列。
//!
//! 缩进形式只用于展示：缩进会在混合内容中引入不重要的空白，
//! 内容散列一律基于非缩进的规范形式计算。

mod body;
mod head;

use std::io::Cursor;

use quick_xml::Writer;

use crate::error::ParseError;
use crate::model::{ElementKind, ElementTree};

/// 固定的命名空间前缀绑定。
const NAMESPACE_BINDINGS: [(&str, &str); 4] = [
    ("xmlns", "http://www.w3.org/ns/ttml"),
    ("xmlns:ttm", "http://www.w3.org/ns/ttml#metadata"),
    ("xmlns:ttp", "http://www.w3.org/ns/ttml#parameter"),
    ("xmlns:tts", "http://www.w3.org/ns/ttml#styling"),
];

/// 序列化整棵文档树。
///
/// `format` 为真时输出两空格缩进的展示形式，否则输出规范形式。
pub(crate) fn serialize_tree(tree: &ElementTree, format: bool) -> Result<String, ParseError> {
    let mut buffer = Vec::new();
    let indent_char = b' ';
    let indent_size = 2;

    let result = if format {
        let mut writer =
            Writer::new_with_indent(Cursor::new(&mut buffer), indent_char, indent_size);
        write_document(&mut writer, tree)
    } else {
        let mut writer = Writer::new(Cursor::new(&mut buffer));
        write_document(&mut writer, tree)
    };

    result?;

    String::from_utf8(buffer).map_err(ParseError::FromUtf8)
}

fn write_document<W: std::io::Write>(
    writer: &mut Writer<W>,
    tree: &ElementTree,
) -> Result<(), ParseError> {
    let Some(tt) = tree.node(tree.root()).kind.as_tt() else {
        return Err(ParseError::InvalidStructure(
            "序列化要求根节点是 tt".to_string(),
        ));
    };

    // 参数属性按固定顺序写出，保证规范形式稳定。
    let mut attrs: Vec<(&'static str, String)> = Vec::new();
    attrs.push(("ttp:timeBase", tt.time_base.to_string()));
    if let Some(clock_mode) = tt.clock_mode {
        attrs.push(("ttp:clockMode", clock_mode.to_string()));
    }
    if let Some(frame_rate) = tt.frame_rate {
        attrs.push(("ttp:frameRate", frame_rate.to_string()));
    }
    if let Some(multiplier) = tt.frame_rate_multiplier {
        attrs.push(("ttp:frameRateMultiplier", multiplier.to_string()));
    }
    if let Some(drop_mode) = tt.drop_mode {
        attrs.push(("ttp:dropMode", drop_mode.to_string()));
    }
    if let Some(marker_mode) = tt.marker_mode {
        attrs.push(("ttp:markerMode", marker_mode.to_string()));
    }
    attrs.push(("ttp:sequenceIdentifier", tt.sequence_identifier.clone()));
    attrs.push(("ttp:sequenceNumber", tt.sequence_number.to_string()));
    if let Some(extent) = &tt.extent {
        attrs.push(("tts:extent", extent.clone()));
    }
    attrs.push(("xml:lang", tt.lang.clone()));
    if let Some(space) = tt.space {
        attrs.push(("xml:space", space.to_string()));
    }

    // 根元素固定写作 tt。
    let mut element_writer = writer.create_element("tt");
    for (key, value) in NAMESPACE_BINDINGS {
        element_writer = element_writer.with_attribute((key, value));
    }
    for (key, value) in &attrs {
        element_writer = element_writer.with_attribute((*key, value.as_str()));
    }

    element_writer.write_inner_content(|writer| {
        for &child in tree.children(tree.root()) {
            match &tree.node(child).kind {
                ElementKind::Head => head::write_head(writer, tree, child)?,
                ElementKind::Body(_) => body::write_body(writer, tree, child)?,
                _ => {}
            }
        }
        Ok::<(), std::io::Error>(())
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    const SOURCE: &str = r##"<tt xmlns="http://www.w3.org/ns/ttml"
    xmlns:ttp="http://www.w3.org/ns/ttml#parameter"
    xmlns:tts="http://www.w3.org/ns/ttml#styling"
    ttp:timeBase="media" ttp:sequenceIdentifier="testSeq" ttp:sequenceNumber="7" xml:lang="en-GB">
  <head>
    <styling>
      <style xml:id="s1" tts:color="#ffffff"/>
    </styling>
    <layout>
      <region xml:id="r1" tts:origin="10% 80%" tts:extent="80% 15%"/>
    </layout>
  </head>
  <body>
    <div region="r1">
      <p xml:id="sub1" begin="2s" end="5.5s" style="s1">Hello</p>
    </div>
  </body>
</tt>"##;

    #[test]
    fn test_canonical_form_is_stable_across_formatting() {
        let tree1 = parse_document(SOURCE).unwrap();
        // 同一文档换一种属性顺序与缩进。
        let shuffled = SOURCE
            .replace("ttp:timeBase=\"media\" ttp:sequenceIdentifier=\"testSeq\"", "ttp:sequenceIdentifier=\"testSeq\" ttp:timeBase=\"media\"")
            .replace("\n  ", "\n      ");
        let tree2 = parse_document(&shuffled).unwrap();
        assert_eq!(
            serialize_tree(&tree1, false).unwrap(),
            serialize_tree(&tree2, false).unwrap()
        );
    }

    #[test]
    fn test_canonical_form_round_trips() {
        let tree = parse_document(SOURCE).unwrap();
        let canonical = serialize_tree(&tree, false).unwrap();
        let reparsed = parse_document(&canonical).unwrap();
        assert_eq!(serialize_tree(&reparsed, false).unwrap(), canonical);
    }

    #[test]
    fn test_canonical_form_contains_fixed_bindings() {
        let tree = parse_document(SOURCE).unwrap();
        let canonical = serialize_tree(&tree, false).unwrap();
        assert!(canonical.starts_with("<tt "));
        assert!(canonical.contains("xmlns:ttp=\"http://www.w3.org/ns/ttml#parameter\""));
        assert!(canonical.contains("ttp:sequenceNumber=\"7\""));
        assert!(canonical.contains("begin=\"2s\""));
        assert!(canonical.contains("end=\"5.5s\""));
    }
}
