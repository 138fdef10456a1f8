//! # 时间模型
//!
//! 该模块定义文档的时钟模型：`timeBase` 及其附属的根元素参数、
//! 三种时间表达式（偏移、挂钟、SMPTE 时间码）的解析与格式化，
//! 以及 SMPTE 帧号与媒体时长之间的换算（含丢帧模式）。

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::ParseError;

/// 文档的时间基准，决定所有时间值的解释方式。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum TimeBase {
    /// 相对流起点的媒体偏移。
    #[default]
    #[strum(serialize = "media")]
    Media,
    /// 当日挂钟时间。
    #[strum(serialize = "clock")]
    Clock,
    /// 帧精确的 SMPTE 时间码。
    #[strum(serialize = "smpte")]
    Smpte,
}

/// `timeBase="clock"` 时挂钟的参照系。
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum ClockMode {
    /// 本地时钟。
    #[strum(serialize = "local")]
    Local,
    /// GPS 时钟。
    #[strum(serialize = "gps")]
    Gps,
    /// UTC 时钟。
    #[strum(serialize = "utc")]
    Utc,
}

/// SMPTE 时间码的丢帧模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Serialize, Deserialize)]
pub enum DropMode {
    /// 不丢帧。
    #[strum(serialize = "nonDrop")]
    NonDrop,
    /// NTSC 丢帧（每分钟丢 2 个帧号，整十分钟除外）。
    #[strum(serialize = "dropNTSC")]
    DropNtsc,
    /// PAL-M 丢帧（每分钟丢 4 个帧号，整十分钟除外）。
    #[strum(serialize = "dropPAL")]
    DropPal,
}

impl DropMode {
    /// 每个非整十分钟丢弃的帧号数量。
    const fn dropped_per_minute(self) -> u64 {
        match self {
            Self::NonDrop => 0,
            Self::DropNtsc => 2,
            Self::DropPal => 4,
        }
    }
}

/// SMPTE 时间码的标记模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Serialize, Deserialize)]
pub enum MarkerMode {
    /// 时间码连续。
    #[strum(serialize = "continuous")]
    Continuous,
    /// 时间码可能跳变。
    #[strum(serialize = "discontinuous")]
    Discontinuous,
}

/// `frameRateMultiplier` 属性：标称帧率的有理数修正因子。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRateMultiplier {
    /// 分子。
    pub numerator: u32,
    /// 分母。
    pub denominator: u32,
}

impl FrameRateMultiplier {
    /// 解析 `"1000 1001"` 形式的属性值。
    pub fn parse(value: &str) -> Result<Self, ParseError> {
        let mut parts = value.split_ascii_whitespace();
        let (Some(num), Some(den), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ParseError::InvalidTime(format!(
                "frameRateMultiplier '{value}' 必须是以空格分隔的两个整数"
            )));
        };
        let numerator: u32 = num.parse()?;
        let denominator: u32 = den.parse()?;
        if numerator == 0 || denominator == 0 {
            return Err(ParseError::InvalidTime(format!(
                "frameRateMultiplier '{value}' 的分子和分母都必须大于零"
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }
}

impl fmt::Display for FrameRateMultiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.numerator, self.denominator)
    }
}

/// 一条 `begin`/`end`/`dur` 属性解析后的时间表达式。
///
/// 三种语法形态可以相互区分，因此绑定层不需要知道文档的 `timeBase`
/// 就能解析；表达式种类与 `timeBase` 是否匹配由语义层检查。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeExpression {
    /// 带度量后缀的偏移量，如 `"12.5s"`。
    Offset(Duration),
    /// `HH:MM:SS(.mmm)` 形式的挂钟时间。
    Clock(Duration),
    /// `HH:MM:SS:FF` 形式的 SMPTE 时间码。
    Smpte {
        /// 小时。
        hours: u32,
        /// 分钟。
        minutes: u32,
        /// 秒。
        seconds: u32,
        /// 帧号。
        frames: u32,
    },
}

impl TimeExpression {
    /// 表达式种类的名称，用于错误报告。
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Offset(_) => "offset",
            Self::Clock(_) => "clock",
            Self::Smpte { .. } => "smpte",
        }
    }

    /// 该表达式种类是否是给定 `timeBase` 下的合法时间值。
    #[must_use]
    pub const fn matches_time_base(&self, time_base: TimeBase) -> bool {
        matches!(
            (self, time_base),
            (Self::Offset(_), TimeBase::Media)
                | (Self::Clock(_), TimeBase::Clock)
                | (Self::Smpte { .. }, TimeBase::Smpte)
        )
    }
}

impl fmt::Display for TimeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset(d) => {
                let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
                let (secs, frac) = (ms / 1000, ms % 1000);
                if frac == 0 {
                    write!(f, "{secs}s")
                } else {
                    let text = format!("{frac:03}");
                    write!(f, "{secs}.{}s", text.trim_end_matches('0'))
                }
            }
            Self::Clock(d) => {
                let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
                let (secs, frac) = (ms / 1000, ms % 1000);
                let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
                if frac == 0 {
                    write!(f, "{h:02}:{m:02}:{s:02}")
                } else {
                    write!(f, "{h:02}:{m:02}:{s:02}.{frac:03}")
                }
            }
            Self::Smpte {
                hours,
                minutes,
                seconds,
                frames,
            } => write!(f, "{hours:02}:{minutes:02}:{seconds:02}:{frames:02}"),
        }
    }
}

/// 解析小数部分（.1, .12, .123），返回毫秒。
fn parse_decimal_ms_part(ms_str: &str, original: &str) -> Result<u64, ParseError> {
    if ms_str.is_empty() || ms_str.len() > 3 || ms_str.chars().any(|c| !c.is_ascii_digit()) {
        return Err(ParseError::InvalidTime(format!(
            "小数部分 '{ms_str}' 在时间值 '{original}' 中无效 (只支持最多3位数字)"
        )));
    }
    let val = ms_str.parse::<u64>()?;
    Ok(val * 10u64.pow(3 - u32::try_from(ms_str.len()).unwrap_or(3)))
}

/// 解析 "SS.mmm" 或 "SS" 格式的字符串，返回整数部分和毫秒。
fn parse_value_with_fraction(text: &str, original: &str) -> Result<(u64, u64), ParseError> {
    let mut dot_parts = text.splitn(2, '.');
    let whole_str = dot_parts.next().unwrap_or_default();

    if whole_str.is_empty() {
        return Err(ParseError::InvalidTime(format!(
            "时间值 '{original}' 的整数部分为空"
        )));
    }
    if whole_str.starts_with('-') {
        return Err(ParseError::InvalidTime(format!("时间值不能为负: '{original}'")));
    }
    let whole = whole_str.parse::<u64>().map_err(|e| {
        ParseError::InvalidTime(format!("在 '{original}' 中解析 '{whole_str}' 失败: {e}"))
    })?;
    let milliseconds = match dot_parts.next() {
        Some(ms_str) => parse_decimal_ms_part(ms_str, original)?,
        None => 0,
    };
    Ok((whole, milliseconds))
}

/// 解析无小数的字段（SMPTE 各段、时钟时间的时与分）。
fn parse_plain_field(text: &str, field: &str, original: &str) -> Result<u64, ParseError> {
    if text.is_empty() || text.chars().any(|c| !c.is_ascii_digit()) {
        return Err(ParseError::InvalidTime(format!(
            "在时间值 '{original}' 中 {field} '{text}' 无效"
        )));
    }
    text.parse::<u64>().map_err(|e| {
        ParseError::InvalidTime(format!("在 '{original}' 中解析 {field} '{text}' 失败: {e}"))
    })
}

/// 解析一条时间表达式字符串。
///
/// 三种语法形态：
/// * 偏移量：`"12s"`、`"12.5s"`、`"90m"`、`"2h"`、`"1500ms"`；
/// * 挂钟时间：`"HH:MM:SS"`，秒可带最多 3 位小数；
/// * SMPTE 时间码：`"HH:MM:SS:FF"`，各段均为整数。
///
/// # Errors
///
/// 输入不符合任何一种形态、字段越界（分、秒 ≥ 60）或值为负时返回
/// [`ParseError::InvalidTime`]。
pub fn parse_time_expression(value: &str) -> Result<TimeExpression, ParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ParseError::InvalidTime("时间值为空".to_string()));
    }

    if trimmed.contains(':') {
        return parse_colon_form(trimmed);
    }

    // 带度量后缀的偏移量。注意先剥 "ms" 再剥 "s"/"m"/"h"。
    if let Some(stripped) = trimmed.strip_suffix("ms") {
        let ms = parse_plain_field(stripped, "毫秒数", trimmed)?;
        return Ok(TimeExpression::Offset(Duration::from_millis(ms)));
    }
    for (metric, unit_ms) in [('s', 1000u64), ('m', 60_000), ('h', 3_600_000)] {
        if let Some(stripped) = trimmed.strip_suffix(metric) {
            let (whole, frac_ms) = parse_value_with_fraction(stripped, trimmed)?;
            // frac_ms 是按秒计的毫秒数，换算到实际度量单位仍是精确整数。
            let total = whole * unit_ms + frac_ms * (unit_ms / 1000);
            return Ok(TimeExpression::Offset(Duration::from_millis(total)));
        }
    }

    Err(ParseError::InvalidTime(format!(
        "时间值 '{trimmed}' 缺少度量后缀且不是时钟或时间码格式"
    )))
}

/// 解析冒号分隔的两种形态：挂钟时间（3 段）与 SMPTE 时间码（4 段）。
fn parse_colon_form(value: &str) -> Result<TimeExpression, ParseError> {
    let parts: Vec<&str> = value.split(':').collect();
    match parts.as_slice() {
        [h, m, s] => {
            let hours = parse_plain_field(h, "小时", value)?;
            let minutes = parse_plain_field(m, "分钟", value)?;
            let (seconds, frac_ms) = parse_value_with_fraction(s, value)?;
            if minutes >= 60 {
                return Err(ParseError::InvalidTime(format!(
                    "分钟值 '{minutes}' (应 < 60) 在时间值 '{value}' 中无效"
                )));
            }
            if seconds >= 60 {
                return Err(ParseError::InvalidTime(format!(
                    "秒值 '{seconds}' (应 < 60) 在时间值 '{value}' 中无效"
                )));
            }
            let total = hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + frac_ms;
            Ok(TimeExpression::Clock(Duration::from_millis(total)))
        }
        [h, m, s, f] => {
            let hours = parse_plain_field(h, "小时", value)?;
            let minutes = parse_plain_field(m, "分钟", value)?;
            let seconds = parse_plain_field(s, "秒", value)?;
            let frames = parse_plain_field(f, "帧号", value)?;
            if minutes >= 60 || seconds >= 60 {
                return Err(ParseError::InvalidTime(format!(
                    "时间码 '{value}' 的分或秒越界 (应 < 60)"
                )));
            }
            let convert = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
            Ok(TimeExpression::Smpte {
                hours: convert(hours),
                minutes: convert(minutes),
                seconds: convert(seconds),
                frames: convert(frames),
            })
        }
        _ => Err(ParseError::InvalidTime(format!(
            "时间值 '{value}' 包含的段数无效 (应为 3 段时钟时间或 4 段时间码)"
        ))),
    }
}

/// SMPTE 换算所需的根元素参数快照。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmpteParameters {
    /// 标称帧率（`frameRate`）。
    pub frame_rate: u32,
    /// 帧率修正因子（`frameRateMultiplier`），缺省视为 1/1。
    pub multiplier: Option<FrameRateMultiplier>,
    /// 丢帧模式（`dropMode`）。
    pub drop_mode: DropMode,
}

impl SmpteParameters {
    /// 每帧的微秒数换算：`frames * 1e6 * den / (rate * num)`。
    fn frames_to_micros(self, frames: u64) -> u64 {
        let (num, den) = self.ratio();
        let micros = u128::from(frames) * 1_000_000 * u128::from(den)
            / (u128::from(self.frame_rate) * u128::from(num));
        u64::try_from(micros).unwrap_or(u64::MAX)
    }

    fn micros_to_frames(self, micros: u64) -> u64 {
        let (num, den) = self.ratio();
        let numerator = u128::from(micros) * u128::from(self.frame_rate) * u128::from(num);
        let denominator = 1_000_000u128 * u128::from(den);
        // 四舍五入到最近的帧。
        u64::try_from((numerator + denominator / 2) / denominator).unwrap_or(u64::MAX)
    }

    const fn ratio(self) -> (u32, u32) {
        match self.multiplier {
            Some(m) => (m.numerator, m.denominator),
            None => (1, 1),
        }
    }
}

/// 将 SMPTE 时间码换算为媒体时长。
///
/// # Errors
///
/// 帧号不小于标称帧率，或在丢帧分钟内使用了被丢弃的帧号时，
/// 返回 [`ParseError::InvalidTime`]。
pub fn smpte_to_duration(
    hours: u32,
    minutes: u32,
    seconds: u32,
    frames: u32,
    params: SmpteParameters,
) -> Result<Duration, ParseError> {
    let rate = u64::from(params.frame_rate);
    let dropped = params.drop_mode.dropped_per_minute();
    if u64::from(frames) >= rate {
        return Err(ParseError::InvalidTime(format!(
            "帧号 {frames} 超出 frameRate={rate} 的取值范围"
        )));
    }
    if dropped > 0 && minutes % 10 != 0 && u64::from(frames) < dropped {
        return Err(ParseError::InvalidTime(format!(
            "帧号 {frames} 在 dropMode={} 下的分钟 {minutes} 内不存在",
            params.drop_mode
        )));
    }
    let total_minutes = u64::from(hours) * 60 + u64::from(minutes);
    let nominal =
        (u64::from(hours) * 3600 + u64::from(minutes) * 60 + u64::from(seconds)) * rate
            + u64::from(frames);
    let frame_number = nominal - dropped * (total_minutes - total_minutes / 10);
    Ok(Duration::from_micros(params.frames_to_micros(frame_number)))
}

/// 将媒体时长换算回 SMPTE 时间码（[`smpte_to_duration`] 的逆运算）。
#[must_use]
pub fn duration_to_smpte(duration: Duration, params: SmpteParameters) -> TimeExpression {
    let rate = u64::from(params.frame_rate);
    let dropped = params.drop_mode.dropped_per_minute();
    let total = params.micros_to_frames(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX));

    let (minutes_total, frame_in_minute) = if dropped == 0 {
        (total / (rate * 60), total % (rate * 60))
    } else {
        let per_minute = rate * 60 - dropped; // 丢帧分钟的实际帧数
        let per_ten = rate * 600 - dropped * 9; // 整十分钟块的实际帧数
        let blocks = total / per_ten;
        let mut rem = total % per_ten;
        let mut minutes = blocks * 10;
        if rem >= rate * 60 {
            // 跳过块内第一个不丢帧的分钟，其余分钟要把被丢弃的帧号补回来。
            rem -= rate * 60;
            minutes += 1 + rem / per_minute;
            rem = rem % per_minute + dropped;
        }
        (minutes, rem)
    };

    let convert = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
    TimeExpression::Smpte {
        hours: convert(minutes_total / 60),
        minutes: convert(minutes_total % 60),
        seconds: convert(frame_in_minute / rate),
        frames: convert(frame_in_minute % rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_ms(ms: u64) -> TimeExpression {
        TimeExpression::Offset(Duration::from_millis(ms))
    }

    #[test]
    fn test_parse_offset_expressions() {
        assert_eq!(parse_time_expression("7s").unwrap(), offset_ms(7000));
        assert_eq!(parse_time_expression("7.1s").unwrap(), offset_ms(7100));
        assert_eq!(parse_time_expression("7.12s").unwrap(), offset_ms(7120));
        assert_eq!(parse_time_expression("7.123s").unwrap(), offset_ms(7123));
        assert_eq!(parse_time_expression("90m").unwrap(), offset_ms(5_400_000));
        assert_eq!(parse_time_expression("1.5m").unwrap(), offset_ms(90_000));
        assert_eq!(parse_time_expression("2h").unwrap(), offset_ms(7_200_000));
        assert_eq!(parse_time_expression("1500ms").unwrap(), offset_ms(1500));
        assert_eq!(parse_time_expression("0s").unwrap(), offset_ms(0));

        assert!(matches!(
            parse_time_expression("-10s"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression(".5s"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression("10.s"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression("10.1234s"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression("1.5ms"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression("abc"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression("10"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression("s"),
            Err(ParseError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_parse_clock_expressions() {
        assert_eq!(
            parse_time_expression("01:02:03").unwrap(),
            TimeExpression::Clock(Duration::from_millis(3_723_000))
        );
        assert_eq!(
            parse_time_expression("01:02:03.456").unwrap(),
            TimeExpression::Clock(Duration::from_millis(3_723_456))
        );
        assert_eq!(
            parse_time_expression("99:59:59.999").unwrap(),
            TimeExpression::Clock(Duration::from_millis(359_999_999))
        );

        assert!(matches!(
            parse_time_expression("01:60:00"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression("01:00:60"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression("01:00:.5"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression("1:2"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression("1:2:3:4:5"),
            Err(ParseError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_parse_smpte_expressions() {
        assert_eq!(
            parse_time_expression("10:00:00:12").unwrap(),
            TimeExpression::Smpte {
                hours: 10,
                minutes: 0,
                seconds: 0,
                frames: 12
            }
        );
        assert!(matches!(
            parse_time_expression("00:00:00:1.5"),
            Err(ParseError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_expression("00:61:00:00"),
            Err(ParseError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["5s", "5.1s", "01:02:03", "01:02:03.456", "10:00:00:12"] {
            let parsed = parse_time_expression(text).unwrap();
            assert_eq!(parsed.to_string(), text);
        }
        // 度量后缀在解析时被归一化为秒。
        assert_eq!(parse_time_expression("90m").unwrap().to_string(), "5400s");
    }

    #[test]
    fn test_time_base_wire_forms() {
        assert_eq!("media".parse::<TimeBase>().unwrap(), TimeBase::Media);
        assert_eq!("smpte".parse::<TimeBase>().unwrap(), TimeBase::Smpte);
        assert_eq!(TimeBase::Clock.to_string(), "clock");
        assert_eq!("dropNTSC".parse::<DropMode>().unwrap(), DropMode::DropNtsc);
        assert_eq!(DropMode::DropPal.to_string(), "dropPAL");
        assert_eq!(
            "continuous".parse::<MarkerMode>().unwrap(),
            MarkerMode::Continuous
        );
        assert!("smtpe".parse::<TimeBase>().is_err());
    }

    #[test]
    fn test_smpte_non_drop_conversion() {
        let params = SmpteParameters {
            frame_rate: 25,
            multiplier: None,
            drop_mode: DropMode::NonDrop,
        };
        let d = smpte_to_duration(0, 0, 4, 10, params).unwrap();
        assert_eq!(d, Duration::from_millis(4400));
        assert_eq!(
            duration_to_smpte(d, params),
            TimeExpression::Smpte {
                hours: 0,
                minutes: 0,
                seconds: 4,
                frames: 10
            }
        );
        assert!(smpte_to_duration(0, 0, 0, 25, params).is_err());
    }

    #[test]
    fn test_smpte_drop_ntsc_conversion() {
        let params = SmpteParameters {
            frame_rate: 30,
            multiplier: Some(FrameRateMultiplier {
                numerator: 1000,
                denominator: 1001,
            }),
            drop_mode: DropMode::DropNtsc,
        };
        // 丢帧分钟内不存在帧号 0 和 1。
        assert!(smpte_to_duration(0, 1, 0, 1, params).is_err());
        assert!(smpte_to_duration(0, 10, 0, 0, params).is_ok());

        // 一分钟的时间码实际只经过 1798 帧。
        let d = smpte_to_duration(0, 1, 0, 2, params).unwrap();
        let expected_micros = (30u128 * 60 - 2) * 1_000_000 * 1001 / 30_000;
        assert_eq!(d.as_micros(), expected_micros);

        // 整点时间码换算往返一致。
        for (h, m, s, f) in [(0, 0, 0, 0), (0, 1, 0, 2), (0, 9, 30, 15), (1, 0, 0, 0)] {
            let d = smpte_to_duration(h, m, s, f, params).unwrap();
            assert_eq!(
                duration_to_smpte(d, params),
                TimeExpression::Smpte {
                    hours: h,
                    minutes: m,
                    seconds: s,
                    frames: f
                },
                "往返失败: {h:02}:{m:02}:{s:02}:{f:02}"
            );
        }
    }

    #[test]
    fn test_frame_rate_multiplier_parse() {
        let m = FrameRateMultiplier::parse("1000 1001").unwrap();
        assert_eq!(m.numerator, 1000);
        assert_eq!(m.denominator, 1001);
        assert_eq!(m.to_string(), "1000 1001");
        assert!(FrameRateMultiplier::parse("1000").is_err());
        assert!(FrameRateMultiplier::parse("0 1").is_err());
    }
}
