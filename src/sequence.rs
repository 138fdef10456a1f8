//! # 文档序列管理
//!
//! 一条逻辑上连续的滚动字幕流。新到的文档先按序列身份与兼容性把关，
//! 再按散列识别重传、按序列号丢弃过期段，最后依投递方式决定是
//! 整体替换还是与现行文档合并。是丢弃坏段继续用现行文档、
//! 还是中止整条序列，由调用方决定——这里只负责把关与合并。

use tracing::{info, warn};

use crate::document::{DeliveryMode, Document};
use crate::error::{DocumentError, SemanticError};
use crate::merge::merge_documents;
use crate::time::{ClockMode, TimeBase};
use crate::validation::ValidationState;

/// 一条字幕序列及其现行文档。
///
/// 合并期间序列独占现行文档槽位；对同一序列的合并必须由调用方串行化。
#[derive(Debug)]
pub struct DocumentSequence {
    sequence_identifier: String,
    lang: String,
    time_base: TimeBase,
    clock_mode: Option<ClockMode>,
    delivery_mode: DeliveryMode,
    last_sequence_number: u64,
    active: Option<Document>,
}

impl DocumentSequence {
    /// 建立一条新序列。
    #[must_use]
    pub fn new(
        sequence_identifier: &str,
        lang: &str,
        time_base: TimeBase,
        clock_mode: Option<ClockMode>,
        delivery_mode: DeliveryMode,
    ) -> Self {
        Self {
            sequence_identifier: sequence_identifier.to_string(),
            lang: lang.to_string(),
            time_base,
            clock_mode,
            delivery_mode,
            last_sequence_number: 0,
            active: None,
        }
    }

    /// 序列标识。
    #[must_use]
    pub fn sequence_identifier(&self) -> &str {
        &self.sequence_identifier
    }

    /// 当前的现行文档。
    #[must_use]
    pub const fn active_document(&self) -> Option<&Document> {
        self.active.as_ref()
    }

    /// 生产侧入口：以下一个序列号建立一份骨架文档。
    ///
    /// # Errors
    ///
    /// 序列的时间基准参数无法构成合法文档时返回错误。
    pub fn new_document(&mut self) -> Result<Document, DocumentError> {
        let number = self.last_sequence_number + 1;
        let mut document = Document::new(
            self.time_base,
            number,
            &self.sequence_identifier,
            &self.lang,
            self.clock_mode,
        )?;
        document.set_delivery_mode(self.delivery_mode);
        self.last_sequence_number = number;
        Ok(document)
    }

    /// 接收一份新到的文档，返回变化后的现行文档。
    ///
    /// 重传（内容散列一致）与过期段（序列号不大于现行文档）被丢弃并
    /// 返回 `Ok(None)`；快照模式整体替换现行文档；滚动模式与现行文档
    /// 合并出新的在播状态。
    ///
    /// # Errors
    ///
    /// 文档未校验、序列标识不符或与序列关键属性冲突时返回错误，
    /// 现行文档保持不变。
    pub fn ingest(&mut self, document: Document) -> Result<Option<&Document>, DocumentError> {
        if document.validation_state() != ValidationState::Validated {
            return Err(SemanticError::ValidationRequired.into());
        }
        if document.sequence_identifier() != self.sequence_identifier {
            return Err(SemanticError::SequenceMismatch {
                left: self.sequence_identifier.clone(),
                right: document.sequence_identifier().to_string(),
            }
            .into());
        }

        let mut conflicting = Vec::new();
        if document.time_base() != self.time_base {
            conflicting.push("timeBase");
        }
        if document.lang() != self.lang {
            conflicting.push("lang");
        }
        if !conflicting.is_empty() {
            return Err(SemanticError::DocumentNotCompatible {
                attributes: conflicting,
            }
            .into());
        }

        info!(
            "文档 {}__{} 接收，激活窗口: [{:?}; {:?}]",
            document.sequence_identifier(),
            document.sequence_number(),
            document.resolved_begin_time(),
            document.resolved_end_time(),
        );

        let next = match self.active.take() {
            None => document,
            Some(active) => {
                if active.has_same_hash(&document) {
                    info!(
                        "文档 {}__{} 为重传，丢弃",
                        document.sequence_identifier(),
                        document.sequence_number(),
                    );
                    self.active = Some(active);
                    return Ok(None);
                }
                if document.sequence_number() <= active.sequence_number() {
                    warn!(
                        "文档 {}__{} 不晚于现行文档 {}，丢弃",
                        document.sequence_identifier(),
                        document.sequence_number(),
                        active.sequence_number(),
                    );
                    self.active = Some(active);
                    return Ok(None);
                }
                match self.delivery_mode {
                    DeliveryMode::Snapshot => document,
                    DeliveryMode::Rolling => {
                        let merged = merge_documents(&active, &document);
                        match merged {
                            Ok(merged) => merged,
                            Err(error) => {
                                // 合并失败不动现行文档，由调用方决定后续策略。
                                self.active = Some(active);
                                return Err(error);
                            }
                        }
                    }
                }
            }
        };

        self.last_sequence_number = self.last_sequence_number.max(next.sequence_number());
        info!(
            "文档 {}__{} 进入序列",
            next.sequence_identifier(),
            next.sequence_number(),
        );
        self.active = Some(next);
        Ok(self.active.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(mode: DeliveryMode) -> DocumentSequence {
        DocumentSequence::new("liveSeq", "en-GB", TimeBase::Media, None, mode)
    }

    fn doc(number: u64, body: &str) -> Document {
        let xml = format!(
            r#"<tt xmlns="http://www.w3.org/ns/ttml"
    xmlns:ttp="http://www.w3.org/ns/ttml#parameter"
    ttp:timeBase="media" ttp:sequenceIdentifier="liveSeq"
    ttp:sequenceNumber="{number}" xml:lang="en-GB">
  <head><styling><style xml:id="s1"/></styling><layout><region xml:id="r1"/></layout></head>
  {body}
</tt>"#
        );
        Document::create_from_markup(&xml).unwrap()
    }

    #[test]
    fn test_first_document_becomes_active() {
        let mut sequence = sequence(DeliveryMode::Rolling);
        let next = sequence
            .ingest(doc(1, r#"<body><p xml:id="c1" begin="1s" end="2s">x</p></body>"#))
            .unwrap();
        assert_eq!(next.map(Document::sequence_number), Some(1));
    }

    #[test]
    fn test_retransmission_is_discarded() {
        let mut sequence = sequence(DeliveryMode::Rolling);
        let body = r#"<body><p xml:id="c1" begin="1s" end="2s">x</p></body>"#;
        sequence.ingest(doc(1, body)).unwrap();
        assert!(sequence.ingest(doc(1, body)).unwrap().is_none());
        assert_eq!(
            sequence.active_document().map(Document::sequence_number),
            Some(1)
        );
    }

    #[test]
    fn test_stale_document_is_discarded() {
        let mut sequence = sequence(DeliveryMode::Snapshot);
        sequence
            .ingest(doc(5, r#"<body><p begin="1s" end="2s">five</p></body>"#))
            .unwrap();
        let stale = sequence
            .ingest(doc(3, r#"<body><p begin="1s" end="2s">three</p></body>"#))
            .unwrap();
        assert!(stale.is_none());
        assert_eq!(
            sequence.active_document().map(Document::sequence_number),
            Some(5)
        );
    }

    #[test]
    fn test_snapshot_mode_replaces_active() {
        let mut sequence = sequence(DeliveryMode::Snapshot);
        sequence
            .ingest(doc(1, r#"<body><p xml:id="c1" begin="1s" end="2s">x</p></body>"#))
            .unwrap();
        sequence
            .ingest(doc(2, r#"<body><p xml:id="c2" begin="3s" end="4s">y</p></body>"#))
            .unwrap();
        let active = sequence.active_document().unwrap();
        assert_eq!(active.sequence_number(), 2);
        assert!(active.get_element_by_id("c2").is_ok());
        assert!(active.get_element_by_id("c1").is_err());
    }

    #[test]
    fn test_rolling_mode_merges_bodies() {
        let mut sequence = sequence(DeliveryMode::Rolling);
        sequence
            .ingest(doc(1, r#"<body><p xml:id="c1" begin="1s" end="2s">x</p></body>"#))
            .unwrap();
        sequence
            .ingest(doc(2, r#"<body><p xml:id="c1" begin="3s" end="4s">y</p></body>"#))
            .unwrap();
        let active = sequence.active_document().unwrap();
        assert_eq!(active.sequence_number(), 2);
        assert!(active.get_element_by_id("c1").is_ok());
        assert!(active.get_element_by_id("c1.1").is_ok());
    }

    #[test]
    fn test_foreign_sequence_is_rejected() {
        let mut sequence = DocumentSequence::new(
            "otherSeq",
            "en-GB",
            TimeBase::Media,
            None,
            DeliveryMode::Rolling,
        );
        assert!(matches!(
            sequence.ingest(doc(1, "<body/>")),
            Err(DocumentError::Semantic(SemanticError::SequenceMismatch { .. }))
        ));
    }

    #[test]
    fn test_incompatible_document_is_rejected() {
        let mut sequence = DocumentSequence::new(
            "liveSeq",
            "de-DE",
            TimeBase::Media,
            None,
            DeliveryMode::Rolling,
        );
        assert!(matches!(
            sequence.ingest(doc(1, "<body/>")),
            Err(DocumentError::Semantic(SemanticError::DocumentNotCompatible { attributes }))
                if attributes == vec!["lang"]
        ));
    }

    #[test]
    fn test_new_document_increments_sequence_number() {
        let mut sequence = DocumentSequence::new(
            "authorSeq",
            "en-GB",
            TimeBase::Clock,
            Some(ClockMode::Local),
            DeliveryMode::Rolling,
        );
        let first = sequence.new_document().unwrap();
        let second = sequence.new_document().unwrap();
        assert_eq!(first.sequence_number(), 1);
        assert_eq!(second.sequence_number(), 2);
        assert!(first.try_lt(&second).unwrap());
    }
}
