//! # 时序解析
//!
//! 把元素的 `begin`/`end`/`dur` 声明换算成绝对激活窗口：
//! 进入时序容器时压入作用域、计算子孙的继承零点，离开时恢复；
//! 时间基准专属的根元素属性组合在下行前一次性检查。

use std::time::Duration;

use crate::error::SemanticError;
use crate::model::{ElementKind, ElementTree, NodeId, TtElement};
use crate::time::{TimeBase, TimeExpression, smpte_to_duration};
use crate::validation::dataset::{Dataset, TimeContext};

/// SMPTE 专属的根元素属性。
const SMPTE_ATTRS: [&str; 3] = ["frameRate", "dropMode", "markerMode"];
/// 挂钟专属的根元素属性。
const CLOCK_ATTRS: [&str; 1] = ["clockMode"];

/// 检查根元素上时间基准专属属性的存在与缺失。
///
/// 声明的 `timeBase` 要求的属性缺失时报 [`SemanticError::MissingAttributes`]，
/// 其他时间基准下出现了这些属性时报 [`SemanticError::InvalidAttributes`]，
/// 两者都列出涉及的属性名。
pub fn validate_time_base_attributes(tt: &TtElement, identity: &str) -> Result<(), SemanticError> {
    let smpte_present = [
        tt.frame_rate.is_some(),
        tt.drop_mode.is_some(),
        tt.marker_mode.is_some(),
    ];
    if tt.time_base == TimeBase::Smpte {
        let missing: Vec<&'static str> = SMPTE_ATTRS
            .iter()
            .zip(smpte_present)
            .filter(|&(_, present)| !present)
            .map(|(&name, _)| name)
            .collect();
        if !missing.is_empty() {
            return Err(SemanticError::MissingAttributes {
                element: identity.to_string(),
                attributes: missing,
            });
        }
    } else {
        let extra: Vec<&'static str> = SMPTE_ATTRS
            .iter()
            .zip(smpte_present)
            .filter(|&(_, present)| present)
            .map(|(&name, _)| name)
            .collect();
        if !extra.is_empty() {
            return Err(SemanticError::InvalidAttributes {
                element: identity.to_string(),
                attributes: extra,
            });
        }
    }

    if tt.time_base == TimeBase::Clock {
        if tt.clock_mode.is_none() {
            return Err(SemanticError::MissingAttributes {
                element: identity.to_string(),
                attributes: CLOCK_ATTRS.to_vec(),
            });
        }
    } else if tt.clock_mode.is_some() {
        return Err(SemanticError::InvalidAttributes {
            element: identity.to_string(),
            attributes: CLOCK_ATTRS.to_vec(),
        });
    }

    Ok(())
}

/// 在文档的时钟模型下把一条时间表达式换算为时长。
///
/// 表达式种类必须与 `timeBase` 匹配；SMPTE 时间码按根元素的
/// 帧率参数换算，换算中的越界（帧号超限、丢帧号不存在）也在这里报告。
pub fn to_duration(
    expr: &TimeExpression,
    ctx: &TimeContext,
    identity: &str,
) -> Result<Duration, SemanticError> {
    if !expr.matches_time_base(ctx.time_base) {
        return Err(SemanticError::TimingFormat {
            element: identity.to_string(),
            detail: format!(
                "timeBase={} 下不接受 {} 类型的时间值 '{expr}'",
                ctx.time_base,
                expr.kind_name()
            ),
        });
    }
    match *expr {
        TimeExpression::Offset(d) | TimeExpression::Clock(d) => Ok(d),
        TimeExpression::Smpte {
            hours,
            minutes,
            seconds,
            frames,
        } => {
            let Some(params) = ctx.smpte else {
                return Err(SemanticError::TimingFormat {
                    element: identity.to_string(),
                    detail: "缺少 SMPTE 换算所需的根元素参数".to_string(),
                });
            };
            smpte_to_duration(hours, minutes, seconds, frames, params).map_err(|e| {
                SemanticError::TimingFormat {
                    element: identity.to_string(),
                    detail: e.to_string(),
                }
            })
        }
    }
}

/// 把一个已解析的绝对时长重新表达为当前时钟模型下的时间表达式。
/// 复制操作为脱离了原时序祖先链的节点落盘时使用。
#[must_use]
pub fn expression_from_duration(duration: Duration, ctx: &TimeContext) -> TimeExpression {
    match (ctx.time_base, ctx.smpte) {
        (TimeBase::Smpte, Some(params)) => crate::time::duration_to_smpte(duration, params),
        (TimeBase::Clock, _) => TimeExpression::Clock(duration),
        _ => TimeExpression::Offset(duration),
    }
}

/// 进入时序元素：解析自身窗口、检查容器包含关系、压入作用域。
pub(super) fn preprocess_timing(
    tree: &mut ElementTree,
    node: NodeId,
    ds: &mut Dataset,
) -> Result<(), SemanticError> {
    let identity = ds.identity_of(&tree.node(node).kind);
    let ctx = ds.time_context;
    let Some(content) = tree.node(node).kind.content() else {
        return Ok(());
    };
    let (begin_expr, end_expr, dur_expr) = (content.begin, content.end, content.dur);

    // end 与 dur 互斥。
    if end_expr.is_some() && dur_expr.is_some() {
        return Err(SemanticError::InvalidAttributes {
            element: identity,
            attributes: vec!["end", "dur"],
        });
    }

    let declared_begin = begin_expr
        .map(|e| to_duration(&e, &ctx, &identity))
        .transpose()?;
    let resolved_begin = ds.timing_syncbase + declared_begin.unwrap_or(Duration::ZERO);

    let resolved_end = match (end_expr, dur_expr) {
        (Some(end), None) => Some(ds.timing_syncbase + to_duration(&end, &ctx, &identity)?),
        (None, Some(dur)) => Some(resolved_begin + to_duration(&dur, &ctx, &identity)?),
        _ => None,
    };

    // 容器收窄：自身无终点时继承容器终点；声明了终点的窗口必须是容器窗口的子集。
    let effective_end = match resolved_end {
        None => ds.timing_end_limit,
        Some(end) => {
            if end < resolved_begin {
                return Err(SemanticError::TimingInconsistency {
                    element: identity,
                    detail: format!("终点 {end:?} 早于起点 {resolved_begin:?}"),
                });
            }
            if let Some(limit) = ds.timing_end_limit
                && end > limit
            {
                return Err(SemanticError::TimingInconsistency {
                    element: identity,
                    detail: format!("终点 {end:?} 超出容器终点 {limit:?}"),
                });
            }
            Some(end)
        }
    };

    if matches!(tree.node(node).kind, ElementKind::P(_)) {
        ds.record_leaf_window(resolved_begin, effective_end);
    }

    if let Some(content) = tree.node_mut(node).kind.content_mut() {
        content.resolved_begin = Some(resolved_begin);
        content.resolved_end = effective_end;
    }

    ds.timing_begin_stack.push(resolved_begin);
    ds.timing_end_stack.push(effective_end);
    ds.timing_syncbase = resolved_begin;
    ds.timing_begin_limit = Some(resolved_begin);
    ds.timing_end_limit = effective_end;
    Ok(())
}

/// 离开时序元素：弹出作用域，恢复父容器的零点与上下限。
pub(super) fn postprocess_timing(ds: &mut Dataset) {
    ds.timing_begin_stack.pop();
    ds.timing_end_stack.pop();
    ds.timing_syncbase = ds
        .timing_begin_stack
        .last()
        .copied()
        .unwrap_or(Duration::ZERO);
    ds.timing_begin_limit = ds.timing_begin_stack.last().copied();
    ds.timing_end_limit = ds.timing_end_stack.last().copied().flatten();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{ClockMode, DropMode, MarkerMode};

    fn media_tt() -> TtElement {
        TtElement {
            time_base: TimeBase::Media,
            clock_mode: None,
            frame_rate: None,
            frame_rate_multiplier: None,
            drop_mode: None,
            marker_mode: None,
            sequence_identifier: "seq".to_string(),
            sequence_number: 1,
            lang: "en-GB".to_string(),
            extent: None,
            space: None,
        }
    }

    #[test]
    fn test_smpte_attrs_required_and_forbidden() {
        let mut tt = media_tt();
        tt.time_base = TimeBase::Smpte;
        tt.frame_rate = Some(25);
        let err = validate_time_base_attributes(&tt, "tt").unwrap_err();
        assert!(matches!(
            err,
            SemanticError::MissingAttributes { attributes, .. }
                if attributes == vec!["dropMode", "markerMode"]
        ));

        tt.drop_mode = Some(DropMode::NonDrop);
        tt.marker_mode = Some(MarkerMode::Continuous);
        assert!(validate_time_base_attributes(&tt, "tt").is_ok());

        // 同一组属性在 clock 基准下被禁止。
        tt.time_base = TimeBase::Clock;
        tt.clock_mode = Some(ClockMode::Local);
        let err = validate_time_base_attributes(&tt, "tt").unwrap_err();
        assert!(matches!(
            err,
            SemanticError::InvalidAttributes { attributes, .. }
                if attributes == vec!["frameRate", "dropMode", "markerMode"]
        ));
    }

    #[test]
    fn test_clock_mode_required_and_forbidden() {
        let mut tt = media_tt();
        tt.time_base = TimeBase::Clock;
        let err = validate_time_base_attributes(&tt, "tt").unwrap_err();
        assert!(matches!(
            err,
            SemanticError::MissingAttributes { attributes, .. } if attributes == vec!["clockMode"]
        ));

        let mut tt = media_tt();
        tt.clock_mode = Some(ClockMode::Local);
        let err = validate_time_base_attributes(&tt, "tt").unwrap_err();
        assert!(matches!(
            err,
            SemanticError::InvalidAttributes { attributes, .. } if attributes == vec!["clockMode"]
        ));
    }

    #[test]
    fn test_expression_kind_must_match_time_base() {
        let ctx = TimeContext {
            time_base: TimeBase::Media,
            ..Default::default()
        };
        let clock_value = TimeExpression::Clock(Duration::from_secs(10));
        assert!(matches!(
            to_duration(&clock_value, &ctx, "p#x"),
            Err(SemanticError::TimingFormat { element, .. }) if element == "p#x"
        ));
        let offset = TimeExpression::Offset(Duration::from_secs(10));
        assert_eq!(to_duration(&offset, &ctx, "p#x").unwrap(), Duration::from_secs(10));
    }
}
