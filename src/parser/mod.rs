//! # 绑定层：标记文本到类型化文档树
//!
//! 针对档案内容模型的流式解析器。只做语法层面的工作：
//! 标签与属性转换为类型化节点、基本的嵌套检查、时间表达式的词法解析。
//! 标识唯一性、引用解析、时序一致性等语义规则由校验层负责。

mod attributes;
mod constants;
mod element;

use quick_xml::{Reader, events::Event};
use tracing::{error, warn};

use self::constants::{
    TAG_BODY, TAG_BR, TAG_DIV, TAG_HEAD, TAG_LAYOUT, TAG_METADATA, TAG_P, TAG_REGION, TAG_SPAN,
    TAG_STYLE, TAG_STYLING, TAG_TT,
};
use crate::error::ParseError;
use crate::model::{ContentElement, ElementKind, ElementTree, NodeId, XmlSpace};

/// 解析一份标记文本，产出类型化的文档树。
///
/// # Errors
///
/// 输入不是良构 XML、根元素不是 `tt`、出现档案之外的元素或
/// 属性值无法词法解析时返回 [`ParseError`]，不产出任何树。
pub(crate) fn parse_document(content: &str) -> Result<ElementTree, ParseError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = true;

    let mut tree: Option<ElementTree> = None;
    let mut stack: Vec<NodeId> = Vec::new();
    // 进入 metadata 等不建模的子树后按深度跳过。
    let mut skip_depth = 0usize;
    let mut buf = Vec::new();

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) => {
                error!("标记解析错误，位置 {}: {e}", reader.error_position());
                return Err(ParseError::Xml(e));
            }
        };

        match event {
            Event::Start(e) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                } else if e.local_name().as_ref() == TAG_METADATA {
                    skip_depth = 1;
                } else {
                    handle_start(&e, &reader, &mut tree, &mut stack)?;
                }
            }
            Event::End(_) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                } else {
                    stack.pop();
                }
            }
            Event::Text(e) => {
                if skip_depth == 0
                    && let Some(tree) = tree.as_mut()
                {
                    let text = e.xml_content().map_err(ParseError::new_parse)?;
                    push_text(tree, &stack, &text);
                }
            }
            Event::CData(e) => {
                if skip_depth == 0
                    && let Some(tree) = tree.as_mut()
                {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    push_text(tree, &stack, &text);
                }
            }
            Event::GeneralRef(e) => {
                if skip_depth == 0
                    && let Some(tree) = tree.as_mut()
                    && let Some(decoded) = decode_entity(e.as_ref())
                {
                    let mut text = String::new();
                    text.push(decoded);
                    push_text(tree, &stack, &text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    tree.ok_or_else(|| ParseError::InvalidStructure("未找到根元素 <tt>".to_string()))
}

fn handle_start(
    e: &quick_xml::events::BytesStart,
    reader: &Reader<&[u8]>,
    tree: &mut Option<ElementTree>,
    stack: &mut Vec<NodeId>,
) -> Result<(), ParseError> {
    let local = e.local_name();
    let tag = local.as_ref();

    if tag == TAG_TT {
        if tree.is_some() {
            return Err(ParseError::InvalidStructure(
                "<tt> 只能作为根元素出现一次".to_string(),
            ));
        }
        let root = ElementTree::new(ElementKind::Tt(element::tt_element(e, reader)?));
        stack.push(root.root());
        *tree = Some(root);
        return Ok(());
    }

    let Some(tree) = tree.as_mut() else {
        return Err(ParseError::InvalidStructure(format!(
            "元素 <{}> 出现在根元素之外",
            String::from_utf8_lossy(tag)
        )));
    };
    let Some(&parent) = stack.last() else {
        return Err(ParseError::InvalidStructure(format!(
            "元素 <{}> 出现在根元素之外",
            String::from_utf8_lossy(tag)
        )));
    };

    let tag_text = String::from_utf8_lossy(tag).into_owned();
    let kind = match tag {
        TAG_HEAD => ElementKind::Head,
        TAG_STYLING => ElementKind::Styling,
        TAG_LAYOUT => ElementKind::Layout,
        TAG_STYLE => ElementKind::Style(element::style_element(e, reader)?),
        TAG_REGION => ElementKind::Region(element::region_element(e, reader)?),
        TAG_BODY => ElementKind::Body(element::content_element(e, reader, "body")?),
        TAG_DIV => ElementKind::Div(element::content_element(e, reader, "div")?),
        TAG_P => ElementKind::P(element::content_element(e, reader, "p")?),
        TAG_SPAN => ElementKind::Span(element::content_element(e, reader, "span")?),
        TAG_BR => ElementKind::Br,
        _ => {
            return Err(ParseError::InvalidStructure(format!(
                "档案不支持元素 <{tag_text}>"
            )));
        }
    };

    if !nesting_allowed(&tree.node(parent).kind, &kind) {
        return Err(ParseError::InvalidStructure(format!(
            "元素 <{tag_text}> 不能作为 <{}> 的子元素",
            tree.node(parent).kind.tag_name()
        )));
    }

    let node = tree.add_child(parent, kind);
    stack.push(node);
    Ok(())
}

/// 档案的内容模型：谁可以出现在谁之下。
const fn nesting_allowed(parent: &ElementKind, child: &ElementKind) -> bool {
    match child {
        ElementKind::Head | ElementKind::Body(_) => matches!(parent, ElementKind::Tt(_)),
        ElementKind::Styling | ElementKind::Layout => matches!(parent, ElementKind::Head),
        ElementKind::Style(_) => matches!(parent, ElementKind::Styling),
        ElementKind::Region(_) => matches!(parent, ElementKind::Layout),
        ElementKind::Div(_) => matches!(parent, ElementKind::Body(_) | ElementKind::Div(_)),
        ElementKind::P(_) => matches!(parent, ElementKind::Body(_) | ElementKind::Div(_)),
        ElementKind::Span(_) | ElementKind::Br | ElementKind::Text(_) => {
            matches!(parent, ElementKind::P(_) | ElementKind::Span(_))
        }
        ElementKind::Tt(_) => false,
    }
}

/// 解码文本中的实体引用为单个字符。未知实体忽略并告警。
fn decode_entity(entity: &[u8]) -> Option<char> {
    let name = str::from_utf8(entity).ok()?;
    if let Some(num_str) = name.strip_prefix('#') {
        let (radix, code_point_str) = num_str
            .strip_prefix('x')
            .map_or((10, num_str), |stripped| (16, stripped));
        return match u32::from_str_radix(code_point_str, radix)
            .ok()
            .and_then(char::from_u32)
        {
            Some(decoded) => Some(decoded),
            None => {
                warn!("无法解析无效的XML数字实体 '&{name};'");
                None
            }
        };
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            warn!("忽略了未知的XML实体 '&{name};'");
            None
        }
    }
}

/// 文本节点只在段落与行内片段中有意义；
/// 纯空白文本除非元素声明了 `xml:space="preserve"`，否则丢弃。
/// 相邻的文本片段（实体引用两侧）并入同一个文本节点。
fn push_text(tree: &mut ElementTree, stack: &[NodeId], text: &str) {
    let Some(&parent) = stack.last() else {
        return;
    };
    let parent_kind = &tree.node(parent).kind;
    if !matches!(parent_kind, ElementKind::P(_) | ElementKind::Span(_)) {
        return;
    }
    let preserve = parent_kind
        .content()
        .and_then(|c| c.space)
        .is_some_and(|s| s == XmlSpace::Preserve);
    if text.trim().is_empty() && !preserve {
        return;
    }
    if let Some(&last) = tree.children(parent).last()
        && let ElementKind::Text(existing) = &mut tree.node_mut(last).kind
    {
        existing.push_str(text);
        return;
    }
    tree.add_child(parent, ElementKind::Text(text.to_string()));
}
