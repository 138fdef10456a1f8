//! # 传输接缝
//!
//! 核心的职责止于校验、排序与合并；上线与收线由外部的传输实现负责。
//! 这里定义双方握手的最小接口：生产侧把序列化好的文档按序列标识
//! 作为逻辑通道交给载体，消费侧把收到的原始字节解析成文档后
//! 交回节点处理。核心本身不做任何 I/O。

use tracing::error;

use crate::document::Document;
use crate::error::DocumentError;
use crate::sequence::DocumentSequence;

/// 序列化一份文档用于上线：逻辑通道（序列标识）加标记字节。
///
/// # Errors
///
/// 规范序列化失败时返回 [`DocumentError::Parse`]。
pub fn emit_document(document: &Document) -> Result<(String, Vec<u8>), DocumentError> {
    Ok((
        document.sequence_identifier().to_string(),
        document.serialize()?.into_bytes(),
    ))
}

/// 生产侧载体：接收按通道分发的已序列化文档。
pub trait ProducerCarriage {
    /// 把一份序列化文档交给传输层。
    fn emit_data(&mut self, channel: &str, data: &[u8]);
}

/// 把一条序列与生产侧载体接起来的消费节点。
///
/// 新文档被序列接受并改变在播状态时，节点把产物交给载体上线。
#[derive(Debug)]
pub struct SequenceConsumerNode<C: ProducerCarriage> {
    sequence: DocumentSequence,
    carriage: C,
}

impl<C: ProducerCarriage> SequenceConsumerNode<C> {
    /// 建立节点。
    pub const fn new(sequence: DocumentSequence, carriage: C) -> Self {
        Self { sequence, carriage }
    }

    /// 所属序列（只读）。
    #[must_use]
    pub const fn sequence(&self) -> &DocumentSequence {
        &self.sequence
    }

    /// 处理一份新到的文档；`None` 表示拉式传输在索要更多输出
    /// （消费节点没有缓存的产出，直接返回）。
    ///
    /// # Errors
    ///
    /// 序列把关失败（标识不符、属性冲突、合并失败）时返回错误，
    /// 在播状态保持不变。
    pub fn process_document(&mut self, document: Option<Document>) -> Result<(), DocumentError> {
        let Some(document) = document else {
            return Ok(());
        };
        if let Some(next) = self.sequence.ingest(document)? {
            let (channel, data) = emit_document(next)?;
            self.carriage.emit_data(&channel, &data);
        }
        Ok(())
    }

    /// 消费侧入口：把传输层收到的原始字节解析、校验为文档后处理。
    ///
    /// # Errors
    ///
    /// 字节不是合法文档时返回解析或校验错误，不改变在播状态。
    pub fn on_new_data(&mut self, data: &[u8]) -> Result<(), DocumentError> {
        let markup = match String::from_utf8(data.to_vec()) {
            Ok(markup) => markup,
            Err(e) => {
                error!("标记文本解码失败: {e}");
                return Err(DocumentError::Parse(e.into()));
            }
        };
        let document = match Document::create_from_markup(&markup) {
            Ok(document) => document,
            Err(e) => {
                error!("标记文本解析失败: {e}");
                return Err(e);
            }
        };
        self.process_document(Some(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DeliveryMode;
    use crate::time::TimeBase;

    #[derive(Default)]
    struct RecordingCarriage {
        emitted: Vec<(String, Vec<u8>)>,
    }

    impl ProducerCarriage for RecordingCarriage {
        fn emit_data(&mut self, channel: &str, data: &[u8]) {
            self.emitted.push((channel.to_string(), data.to_vec()));
        }
    }

    fn markup(number: u64, text: &str) -> String {
        format!(
            r#"<tt xmlns="http://www.w3.org/ns/ttml"
    xmlns:ttp="http://www.w3.org/ns/ttml#parameter"
    ttp:timeBase="media" ttp:sequenceIdentifier="nodeSeq"
    ttp:sequenceNumber="{number}" xml:lang="en-GB">
  <body><p xml:id="c{number}" begin="1s" end="2s">{text}</p></body>
</tt>"#
        )
    }

    fn node() -> SequenceConsumerNode<RecordingCarriage> {
        let sequence = DocumentSequence::new(
            "nodeSeq",
            "en-GB",
            TimeBase::Media,
            None,
            DeliveryMode::Rolling,
        );
        SequenceConsumerNode::new(sequence, RecordingCarriage::default())
    }

    #[test]
    fn test_accepted_document_is_emitted_on_its_channel() {
        let mut node = node();
        node.on_new_data(markup(1, "hello").as_bytes()).unwrap();
        node.on_new_data(markup(2, "world").as_bytes()).unwrap();

        assert_eq!(node.carriage.emitted.len(), 2);
        assert_eq!(node.carriage.emitted[0].0, "nodeSeq");
        let payload = String::from_utf8(node.carriage.emitted[1].1.clone()).unwrap();
        assert!(payload.contains("ttp:sequenceNumber=\"2\""));
        assert!(payload.contains("c1"));
        assert!(payload.contains("c2"));
    }

    #[test]
    fn test_discarded_retransmission_is_not_emitted() {
        let mut node = node();
        let first = markup(1, "hello");
        node.on_new_data(first.as_bytes()).unwrap();
        node.on_new_data(first.as_bytes()).unwrap();
        assert_eq!(node.carriage.emitted.len(), 1);
    }

    #[test]
    fn test_pull_request_without_document_is_a_no_op() {
        let mut node = node();
        node.process_document(None).unwrap();
        assert!(node.carriage.emitted.is_empty());
    }

    #[test]
    fn test_invalid_bytes_are_rejected_without_state_change() {
        let mut node = node();
        assert!(node.on_new_data(b"<tt></oops>").is_err());
        assert!(node.sequence().active_document().is_none());
    }
}
