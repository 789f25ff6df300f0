//! Parsing of a bare message body without service envelopes

use crate::config::ReaderConfig;
use crate::emitter::Emitter;
use crate::mapper::{MessageMapper, Output, SegmentLocation};
use crate::reader::BufferedSegmentReader;
use crate::tokenizer::unescape;
use crate::Result;
use edi_ir::ContentHandler;
use edi_schema::Edimap;
use edi_validation::ValidationReport;
use std::io::BufRead;
use std::sync::Arc;
use tracing::debug;

const MESSAGE_PATH: &str = "message[1]";

/// Decodes one message body against a fixed mapping model
pub struct MessageParser {
    model: Arc<Edimap>,
    config: ReaderConfig,
}

impl MessageParser {
    pub fn new(model: Arc<Edimap>) -> Self {
        Self {
            model,
            config: ReaderConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse `input` as a single message; the model's delimiters win over
    /// the configured ones.
    pub fn parse<R: BufRead>(
        &self,
        input: R,
        handler: &mut dyn ContentHandler,
    ) -> Result<ValidationReport> {
        let delimiters = self.model.delimiters().copied().unwrap_or(self.config.delimiters);
        let mut reader =
            BufferedSegmentReader::new(input, delimiters).ignore_newlines(self.config.ignore_newlines);
        let mut out = Output::new(Emitter::new(handler, self.config.indent));
        let mut mapper = MessageMapper::new(Arc::clone(&self.model), 0, self.config.max_depth);

        out.emitter.start_document()?;
        mapper.start(&mut out)?;
        while let Some(raw) = reader.next_segment()? {
            let fields = reader.current_segment_fields().to_vec();
            let code = fields
                .first()
                .map(|c| unescape(c, delimiters.escape()))
                .unwrap_or_default();
            let location =
                SegmentLocation::new(MESSAGE_PATH, &code, reader.segment_number(), reader.offset());
            mapper.feed(&mut out, &self.config, &delimiters, &raw, &fields, &location)?;
        }
        let end = SegmentLocation::new(MESSAGE_PATH, "", reader.segment_number(), reader.offset());
        mapper.finish(&mut out, &end)?;
        out.emitter.end_document()?;

        debug!(
            model = %self.model.description(),
            mapped = mapper.mapped_segments(),
            skipped = mapper.skipped_segments(),
            "Message parsed"
        );
        Ok(out.diagnostics)
    }
}
