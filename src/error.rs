use std::fmt;

use quick_xml::{
    Error as QuickXmlErrorMain, encoding::EncodingError,
    events::attributes::AttrError as QuickXmlAttrError,
};
use thiserror::Error;

/// 绑定层（语法层）错误：XML 文本无法转换为类型化的文档树。
#[derive(Error, Debug)]
pub enum ParseError {
    /// XML 读取错误，通常来自 `quick-xml` 库。
    #[error("XML 解析错误: {0}")]
    Xml(#[from] QuickXmlErrorMain),
    /// XML 属性解析错误，通常来自 `quick-xml` 库。
    #[error("XML 属性错误: {0}")]
    Attribute(#[from] QuickXmlAttrError),
    /// XML 文本编码或解码错误。
    #[error("文本编码或解码错误: {0}")]
    Encoding(#[from] EncodingError),
    /// 从字节序列转换为 UTF-8 字符串失败。
    #[error("UTF-8 转换错误: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),
    /// 整数解析错误。
    #[error("整数解析错误: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
    /// 无效的时间表达式字符串。
    #[error("无效的时间格式: {0}")]
    InvalidTime(String),
    /// 属性值不在档案允许的取值范围内（例如未知的 timeBase）。
    #[error("元素 <{element}> 的属性 {attribute} 取值无效: {value}")]
    InvalidAttributeValue {
        /// 属性所在元素的标签名。
        element: String,
        /// 属性名。
        attribute: String,
        /// 无法接受的原始取值。
        value: String,
    },
    /// 文档结构不符合档案的内容模型（未知标签、错误的嵌套等）。
    #[error("文档结构无效: {0}")]
    InvalidStructure(String),
    /// 字符串格式化错误。
    #[error("格式错误: {0}")]
    Format(#[from] fmt::Error),
    /// 序列化时的 IO 错误。
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// 把底层解析库的任意错误包装为结构错误。
    pub(crate) fn new_parse(err: impl fmt::Display) -> Self {
        Self::InvalidStructure(err.to_string())
    }
}

/// 语义层错误：文档在语法上合法，但违反了档案的语义规则。
///
/// 每个变体都携带出错元素的标识（`xml:id`，没有时用遍历路径代替），
/// 以及重现问题所需的属性名或引用名。
#[derive(Error, Debug)]
pub enum SemanticError {
    /// 属性的声明类型与档案的预期不符（在语义遍历开始前检出）。
    #[error("元素 {element} 的属性 {attribute} 结构无效: {detail}")]
    Structural {
        /// 出错元素的标识。
        element: String,
        /// 出错的属性名。
        attribute: &'static str,
        /// 具体原因。
        detail: String,
    },
    /// 当前 timeBase 要求的根元素属性缺失。
    #[error("{element} 缺少必需属性: {attributes:?}")]
    MissingAttributes {
        /// 出错元素的标识。
        element: String,
        /// 缺失的属性名列表。
        attributes: Vec<&'static str>,
    },
    /// 出现了当前 timeBase 禁止的根元素属性。
    #[error("{element} 存在无效属性: {attributes:?}")]
    InvalidAttributes {
        /// 出错元素的标识。
        element: String,
        /// 不被允许的属性名列表。
        attributes: Vec<&'static str>,
    },
    /// 时间值的种类或取值范围与文档的 timeBase 不兼容。
    #[error("元素 {element} 的时间值无效: {detail}")]
    TimingFormat {
        /// 出错元素的标识。
        element: String,
        /// 具体原因。
        detail: String,
    },
    /// 元素的激活窗口与祖先容器的窗口不一致。
    #[error("元素 {element} 的时间窗口不一致: {detail}")]
    TimingInconsistency {
        /// 出错元素的标识。
        element: String,
        /// 具体原因。
        detail: String,
    },
    /// 样式引用无法解析。
    #[error("元素 {element} 引用的样式 {style} 不存在")]
    StyleNotFound {
        /// 引用方元素的标识。
        element: String,
        /// 缺失的样式 ID。
        style: String,
    },
    /// 样式继承链中存在循环引用。
    #[error("样式 {style} 存在循环引用")]
    CircularStyleReference {
        /// 链路中被重入的样式 ID。
        style: String,
    },
    /// 区域引用无法解析。
    #[error("元素 {element} 引用的区域 {region} 不存在")]
    RegionNotFound {
        /// 引用方元素的标识。
        element: String,
        /// 缺失的区域 ID。
        region: String,
    },
    /// 同一文档内 `xml:id` 不唯一。
    #[error("XML ID 不唯一: {id}")]
    DuplicateId {
        /// 冲突的 ID。
        id: String,
    },
    /// 按 ID 查找元素失败。
    #[error("找不到 ID 为 {id} 的元素")]
    ElementNotFound {
        /// 未注册的 ID。
        id: String,
    },
    /// 在语义校验完成前访问了只有校验后才有效的状态。
    #[error("请先对文档运行语义校验")]
    ValidationRequired,
    /// 复制操作触及了声明的受影响子树之外的元素。
    #[error("元素 {element} 不在本次复制允许的子树范围内")]
    OutsideAffectedSubset {
        /// 越界元素的标识。
        element: String,
    },
    /// 比较了来自不同序列的文档。
    #[error("sequenceIdentifier 不匹配: {left} 与 {right}")]
    SequenceMismatch {
        /// 左侧文档的序列标识。
        left: String,
        /// 右侧文档的序列标识。
        right: String,
    },
    /// 文档与序列中现行文档的关键属性冲突，无法合并。
    #[error("文档与序列不兼容，冲突属性: {attributes:?}")]
    DocumentNotCompatible {
        /// 取值不一致的属性名列表。
        attributes: Vec<&'static str>,
    },
}

/// 文档层面的统一错误类型，覆盖从标记文本到现行文档的完整链路。
#[derive(Error, Debug)]
pub enum DocumentError {
    /// 语法层失败，没有产生任何文档。
    #[error("文档解析失败: {0}")]
    Parse(#[from] ParseError),
    /// 语义校验失败，文档被整体拒绝。
    #[error("语义校验失败: {0}")]
    Semantic(#[from] SemanticError),
}
