//! 绑定层使用的标签名与属性局部名常量。

pub(super) const TAG_TT: &[u8] = b"tt";
pub(super) const TAG_HEAD: &[u8] = b"head";
pub(super) const TAG_METADATA: &[u8] = b"metadata";
pub(super) const TAG_STYLING: &[u8] = b"styling";
pub(super) const TAG_LAYOUT: &[u8] = b"layout";
pub(super) const TAG_STYLE: &[u8] = b"style";
pub(super) const TAG_REGION: &[u8] = b"region";
pub(super) const TAG_BODY: &[u8] = b"body";
pub(super) const TAG_DIV: &[u8] = b"div";
pub(super) const TAG_P: &[u8] = b"p";
pub(super) const TAG_SPAN: &[u8] = b"span";
pub(super) const TAG_BR: &[u8] = b"br";

pub(super) const ATTR_ID: &[u8] = b"id";
pub(super) const ATTR_LANG: &[u8] = b"lang";
pub(super) const ATTR_SPACE: &[u8] = b"space";
pub(super) const ATTR_BEGIN: &[u8] = b"begin";
pub(super) const ATTR_END: &[u8] = b"end";
pub(super) const ATTR_DUR: &[u8] = b"dur";
pub(super) const ATTR_STYLE: &[u8] = b"style";
pub(super) const ATTR_REGION: &[u8] = b"region";

pub(super) const ATTR_TIME_BASE: &[u8] = b"timeBase";
pub(super) const ATTR_CLOCK_MODE: &[u8] = b"clockMode";
pub(super) const ATTR_FRAME_RATE: &[u8] = b"frameRate";
pub(super) const ATTR_FRAME_RATE_MULTIPLIER: &[u8] = b"frameRateMultiplier";
pub(super) const ATTR_DROP_MODE: &[u8] = b"dropMode";
pub(super) const ATTR_MARKER_MODE: &[u8] = b"markerMode";
pub(super) const ATTR_SEQUENCE_IDENTIFIER: &[u8] = b"sequenceIdentifier";
pub(super) const ATTR_SEQUENCE_NUMBER: &[u8] = b"sequenceNumber";

pub(super) const ATTR_EXTENT: &[u8] = b"extent";
pub(super) const ATTR_ORIGIN: &[u8] = b"origin";
pub(super) const ATTR_COLOR: &[u8] = b"color";
pub(super) const ATTR_BACKGROUND_COLOR: &[u8] = b"backgroundColor";
pub(super) const ATTR_FONT_FAMILY: &[u8] = b"fontFamily";
pub(super) const ATTR_FONT_SIZE: &[u8] = b"fontSize";
pub(super) const ATTR_LINE_HEIGHT: &[u8] = b"lineHeight";
pub(super) const ATTR_TEXT_ALIGN: &[u8] = b"textAlign";
pub(super) const ATTR_WRAP_OPTION: &[u8] = b"wrapOption";
