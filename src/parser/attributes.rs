//! # 属性提取辅助函数
//!
//! 元素的属性可能带命名空间前缀（`ttp:`、`tts:`、`xml:`），
//! 这里统一按局部名匹配，并把取值解码、反转义为字符串后交给调用方转换。

use std::str::FromStr;

use quick_xml::{Reader, events::BytesStart};

use crate::error::ParseError;
use crate::time::TimeExpression;

/// 按局部名获取属性的解码字符串值。
pub(super) fn get_string_attribute(
    e: &BytesStart,
    reader: &Reader<&[u8]>,
    local: &[u8],
) -> Result<Option<String>, ParseError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local {
            let decoded = attr.decode_and_unescape_value(reader.decoder())?;
            return Ok(Some(decoded.into_owned()));
        }
    }
    Ok(None)
}

/// 获取属性并用 `FromStr` 转换为目标类型（枚举、整数等）。
pub(super) fn get_parsed_attribute<T: FromStr>(
    e: &BytesStart,
    reader: &Reader<&[u8]>,
    local: &[u8],
    element: &str,
) -> Result<Option<T>, ParseError> {
    match get_string_attribute(e, reader, local)? {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ParseError::InvalidAttributeValue {
                element: element.to_string(),
                attribute: String::from_utf8_lossy(local).into_owned(),
                value,
            }),
        None => Ok(None),
    }
}

/// 获取属性并解析为时间表达式。
pub(super) fn get_time_attribute(
    e: &BytesStart,
    reader: &Reader<&[u8]>,
    local: &[u8],
) -> Result<Option<TimeExpression>, ParseError> {
    get_string_attribute(e, reader, local)?
        .map(|value| crate::time::parse_time_expression(&value))
        .transpose()
}

/// 获取以空白分隔的引用列表属性（多重样式引用）。
pub(super) fn get_reference_list(
    e: &BytesStart,
    reader: &Reader<&[u8]>,
    local: &[u8],
) -> Result<Vec<String>, ParseError> {
    Ok(get_string_attribute(e, reader, local)?
        .map(|value| {
            value
                .split_ascii_whitespace()
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default())
}
