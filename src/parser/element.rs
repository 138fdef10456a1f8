//! # 元素构造
//!
//! 把一个开始标签的属性集转换成对应变体的类型化数据。
//! 时间表达式在这里解析成类型化的值；表达式种类与 `timeBase`
//! 是否匹配属于语义问题，留给校验层。

use quick_xml::{Reader, events::BytesStart};

use super::attributes::{
    get_parsed_attribute, get_reference_list, get_string_attribute, get_time_attribute,
};
use super::constants::{
    ATTR_BACKGROUND_COLOR, ATTR_BEGIN, ATTR_CLOCK_MODE, ATTR_COLOR, ATTR_DROP_MODE, ATTR_DUR,
    ATTR_END, ATTR_EXTENT, ATTR_FONT_FAMILY, ATTR_FONT_SIZE, ATTR_FRAME_RATE,
    ATTR_FRAME_RATE_MULTIPLIER, ATTR_ID, ATTR_LANG, ATTR_LINE_HEIGHT, ATTR_MARKER_MODE,
    ATTR_ORIGIN, ATTR_REGION, ATTR_SEQUENCE_IDENTIFIER, ATTR_SEQUENCE_NUMBER, ATTR_SPACE,
    ATTR_STYLE, ATTR_TEXT_ALIGN, ATTR_TIME_BASE, ATTR_WRAP_OPTION,
};
use crate::error::ParseError;
use crate::model::{ContentElement, RegionElement, StyleAttributes, StyleElement, TtElement, XmlSpace};
use crate::time::{ClockMode, DropMode, FrameRateMultiplier, MarkerMode, TimeBase};

/// 根元素上序列标识等属性是档案必需的。
fn required(value: Option<String>, element: &str, attribute: &str) -> Result<String, ParseError> {
    value.ok_or_else(|| {
        ParseError::InvalidStructure(format!("元素 <{element}> 缺少必需属性 {attribute}"))
    })
}

pub(super) fn tt_element(e: &BytesStart, reader: &Reader<&[u8]>) -> Result<TtElement, ParseError> {
    let frame_rate_multiplier = get_string_attribute(e, reader, ATTR_FRAME_RATE_MULTIPLIER)?
        .map(|value| FrameRateMultiplier::parse(&value))
        .transpose()?;
    Ok(TtElement {
        time_base: get_parsed_attribute::<TimeBase>(e, reader, ATTR_TIME_BASE, "tt")?
            .unwrap_or_default(),
        clock_mode: get_parsed_attribute::<ClockMode>(e, reader, ATTR_CLOCK_MODE, "tt")?,
        frame_rate: get_parsed_attribute::<u32>(e, reader, ATTR_FRAME_RATE, "tt")?,
        frame_rate_multiplier,
        drop_mode: get_parsed_attribute::<DropMode>(e, reader, ATTR_DROP_MODE, "tt")?,
        marker_mode: get_parsed_attribute::<MarkerMode>(e, reader, ATTR_MARKER_MODE, "tt")?,
        sequence_identifier: required(
            get_string_attribute(e, reader, ATTR_SEQUENCE_IDENTIFIER)?,
            "tt",
            "ttp:sequenceIdentifier",
        )?,
        sequence_number: required(
            get_string_attribute(e, reader, ATTR_SEQUENCE_NUMBER)?,
            "tt",
            "ttp:sequenceNumber",
        )?
        .parse()?,
        lang: required(get_string_attribute(e, reader, ATTR_LANG)?, "tt", "xml:lang")?,
        extent: get_string_attribute(e, reader, ATTR_EXTENT)?,
        space: get_parsed_attribute::<XmlSpace>(e, reader, ATTR_SPACE, "tt")?,
    })
}

pub(super) fn content_element(
    e: &BytesStart,
    reader: &Reader<&[u8]>,
    element: &str,
) -> Result<ContentElement, ParseError> {
    Ok(ContentElement {
        xml_id: get_string_attribute(e, reader, ATTR_ID)?,
        begin: get_time_attribute(e, reader, ATTR_BEGIN)?,
        end: get_time_attribute(e, reader, ATTR_END)?,
        dur: get_time_attribute(e, reader, ATTR_DUR)?,
        style_refs: get_reference_list(e, reader, ATTR_STYLE)?,
        region_ref: get_string_attribute(e, reader, ATTR_REGION)?,
        lang: get_string_attribute(e, reader, ATTR_LANG)?,
        space: get_parsed_attribute::<XmlSpace>(e, reader, ATTR_SPACE, element)?,
        ..Default::default()
    })
}

pub(super) fn style_element(
    e: &BytesStart,
    reader: &Reader<&[u8]>,
) -> Result<StyleElement, ParseError> {
    Ok(StyleElement {
        xml_id: required(get_string_attribute(e, reader, ATTR_ID)?, "style", "xml:id")?,
        style_refs: get_reference_list(e, reader, ATTR_STYLE)?,
        attributes: style_attributes(e, reader)?,
        ordered_styles: None,
    })
}

pub(super) fn region_element(
    e: &BytesStart,
    reader: &Reader<&[u8]>,
) -> Result<RegionElement, ParseError> {
    Ok(RegionElement {
        xml_id: required(get_string_attribute(e, reader, ATTR_ID)?, "region", "xml:id")?,
        style_refs: get_reference_list(e, reader, ATTR_STYLE)?,
        origin: get_string_attribute(e, reader, ATTR_ORIGIN)?,
        extent: get_string_attribute(e, reader, ATTR_EXTENT)?,
        attributes: style_attributes(e, reader)?,
        applicable_styles: None,
    })
}

fn style_attributes(
    e: &BytesStart,
    reader: &Reader<&[u8]>,
) -> Result<StyleAttributes, ParseError> {
    Ok(StyleAttributes {
        color: get_string_attribute(e, reader, ATTR_COLOR)?,
        background_color: get_string_attribute(e, reader, ATTR_BACKGROUND_COLOR)?,
        font_family: get_string_attribute(e, reader, ATTR_FONT_FAMILY)?,
        font_size: get_string_attribute(e, reader, ATTR_FONT_SIZE)?,
        line_height: get_string_attribute(e, reader, ATTR_LINE_HEIGHT)?,
        text_align: get_string_attribute(e, reader, ATTR_TEXT_ALIGN)?,
        wrap_option: get_string_attribute(e, reader, ATTR_WRAP_OPTION)?,
    })
}
