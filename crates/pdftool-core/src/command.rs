//! JSON command surface for hosts that talk to the engine by message

use std::time::Instant;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::{Document, DocumentInfo};
use crate::error::PdfToolError;
use crate::image::ImageInput;
use crate::{convert, merge, split, watermark};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PdfCommand {
    Merge {
        files: Vec<Vec<u8>>,
    },
    Split {
        file: Vec<u8>,
        ranges: Vec<(u32, u32)>,
    },
    ImagesToPdf {
        images: Vec<ImageInput>,
    },
    Watermark {
        file: Vec<u8>,
        text: String,
    },
    Info {
        file: Vec<u8>,
    },
}

impl PdfCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PdfCommand::Merge { .. } => "Merge",
            PdfCommand::Split { .. } => "Split",
            PdfCommand::ImagesToPdf { .. } => "ImagesToPdf",
            PdfCommand::Watermark { .. } => "Watermark",
            PdfCommand::Info { .. } => "Info",
        }
    }

    fn input_size(&self) -> usize {
        match self {
            PdfCommand::Merge { files } => files.iter().map(Vec::len).sum(),
            PdfCommand::ImagesToPdf { images } => images.iter().map(|i| i.data.len()).sum(),
            PdfCommand::Split { file, .. }
            | PdfCommand::Watermark { file, .. }
            | PdfCommand::Info { file } => file.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    /// Base64-encoded PDF outputs, one per produced document
    pub documents: Vec<String>,
    pub info: Option<DocumentInfo>,
    pub error: Option<String>,
    pub metrics: Option<ProcessMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

struct Output {
    documents: Vec<Vec<u8>>,
    info: Option<DocumentInfo>,
    page_count: u32,
}

/// Run a command; failures are reported in the result, never as a panic
pub fn process_command(command: PdfCommand) -> ProcessResult {
    let started = Instant::now();
    let input_size_bytes = command.input_size();
    let name = command.name();

    match execute(command) {
        Ok(output) => ProcessResult {
            success: true,
            documents: output.documents.iter().map(|d| BASE64.encode(d)).collect(),
            metrics: Some(ProcessMetrics {
                input_size_bytes,
                output_size_bytes: output.documents.iter().map(Vec::len).sum(),
                page_count: output.page_count,
                processing_time_ms: started.elapsed().as_millis() as u64,
            }),
            info: output.info,
            error: None,
        },
        Err(err) => {
            warn!(command = name, error = %err, "command failed");
            ProcessResult {
                success: false,
                documents: Vec::new(),
                info: None,
                error: Some(err.to_string()),
                metrics: None,
            }
        }
    }
}

fn execute(command: PdfCommand) -> Result<Output, PdfToolError> {
    match command {
        PdfCommand::Merge { files } => single(merge::merge_documents(&files)?),
        PdfCommand::Split { file, ranges } => {
            let documents = split::split_document(&file, &ranges)?;
            let page_count = ranges.iter().map(|(start, end)| end - start + 1).sum();
            Ok(Output {
                documents,
                info: None,
                page_count,
            })
        }
        PdfCommand::ImagesToPdf { images } => single(convert::images_to_pdf(&images)?),
        PdfCommand::Watermark { file, text } => single(watermark::watermark_pdf(&file, &text)?),
        PdfCommand::Info { file } => {
            let info = Document::load(&file)?.info();
            Ok(Output {
                documents: Vec::new(),
                page_count: info.page_count as u32,
                info: Some(info),
            })
        }
    }
}

fn single(bytes: Vec<u8>) -> Result<Output, PdfToolError> {
    let page_count = crate::get_page_count(&bytes)?;
    Ok(Output {
        documents: vec![bytes],
        info: None,
        page_count,
    })
}
