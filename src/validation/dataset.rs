//! # 遍历上下文
//!
//! 一次顶层校验调用的全部可变状态。在根元素的校验开始时新建，
//! 返回时整体丢弃，绝不跨趟保留——失败的趟次不会留下任何半成品状态。

use std::time::Duration;

use crate::model::{ElementKind, NodeId, TtElement};
use crate::time::{ClockMode, SmpteParameters, TimeBase};
use crate::validation::registry::ElementRegistry;

/// 根元素时间参数的快照，供子孙节点换算时间值。
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeContext {
    /// 文档的时间基准。
    pub time_base: TimeBase,
    /// 挂钟参照系。
    pub clock_mode: Option<ClockMode>,
    /// SMPTE 换算参数，仅 `timeBase="smpte"` 且参数齐备时存在。
    pub smpte: Option<SmpteParameters>,
}

impl TimeContext {
    /// 从根元素属性建立快照。SMPTE 参数不全时留空，
    /// 属性存在性本身由时间基准校验单独报告。
    #[must_use]
    pub fn from_tt(tt: &TtElement) -> Self {
        let smpte = match (tt.time_base, tt.frame_rate, tt.drop_mode) {
            (TimeBase::Smpte, Some(frame_rate), Some(drop_mode)) => Some(SmpteParameters {
                frame_rate,
                multiplier: tt.frame_rate_multiplier,
                drop_mode,
            }),
            _ => None,
        };
        Self {
            time_base: tt.time_base,
            clock_mode: tt.clock_mode,
            smpte,
        }
    }
}

/// 一趟校验的共享可变上下文。
#[derive(Debug, Default)]
pub struct Dataset {
    /// 已进入的时序容器的绝对起点栈。
    pub timing_begin_stack: Vec<Duration>,
    /// 已进入的时序容器的有效终点栈（`None` 为无界）。
    pub timing_end_stack: Vec<Option<Duration>>,
    /// 当前继承的零点：最近时序祖先的绝对起点。
    pub timing_syncbase: Duration,
    /// 容器施加的起点下限。
    pub timing_begin_limit: Option<Duration>,
    /// 容器施加的终点上限。
    pub timing_end_limit: Option<Duration>,
    /// 当前作用域内的样式集合栈，随遍历推入弹出。
    pub styles_stack: Vec<Vec<NodeId>>,
    /// 正在建立的标识注册表。
    pub registry: ElementRegistry,
    /// 根元素时间参数快照。
    pub time_context: TimeContext,
    /// 文档是否声明了像素范围（决定像素单位是否可用）。
    pub has_document_extent: bool,
    /// 遍历路径面包屑，用于给没有 `xml:id` 的元素生成错误标识。
    pub path: Vec<&'static str>,
    /// 目前观察到的最早段落起点（文档激活窗口）。
    pub document_begin: Option<Duration>,
    /// 目前观察到的最晚段落终点。
    pub document_end: Option<Duration>,
    /// 是否出现了终点无界的段落。
    pub document_end_unbounded: bool,
}

impl Dataset {
    /// 出错元素的标识：有 `xml:id` 用 `tag#id`，否则用遍历路径。
    #[must_use]
    pub fn identity_of(&self, kind: &ElementKind) -> String {
        match kind.xml_id() {
            Some(id) => format!("{}#{id}", kind.tag_name()),
            None if self.path.is_empty() => kind.tag_name().to_string(),
            None => format!("{}/{}", self.path.join("/"), kind.tag_name()),
        }
    }

    /// 把一个段落的解析窗口并入文档激活窗口。
    pub fn record_leaf_window(&mut self, begin: Duration, end: Option<Duration>) {
        self.document_begin = Some(match self.document_begin {
            Some(current) => current.min(begin),
            None => begin,
        });
        match end {
            Some(end) => {
                self.document_end = Some(match self.document_end {
                    Some(current) => current.max(end),
                    None => end,
                });
            }
            None => self.document_end_unbounded = true,
        }
    }
}
