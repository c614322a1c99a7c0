//! Streaming builder
//!
//! Writes PDF objects as pages complete, through an [`IncrementalPdfWriter`],
//! into any `io::Write`. [`spawn_stream`] runs layout and painting on a
//! blocking thread and hands the bytes to the caller as a [`DocumentStream`]
//! of chunks over a bounded `async_channel`.

use std::io::{self, Cursor, Write};

use image::{ColorType, ImageFormat, ImageReader};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream};

use crate::config::{ImageProfile, Settings, StreamSettings};
use crate::error::RenderError;
use crate::model::{Color, LayoutBlock};
use crate::pipeline::images::{encode_jpeg, flatten_onto_white};
use crate::render::helpers::{deflate_stream, measurer, rgb_operands, win_ansi_byte, Face};
use crate::render::layout::{layout_document, paint, PageGeometry};

use super::pdf_writer::{escape_literal, IncrementalPdfWriter};
use super::{aligned_start, DrawBackend, Point, Size, TextStyle};

fn font_resource(face: Face) -> &'static str {
    match face {
        Face::Regular => "F1",
        Face::Bold => "F2",
    }
}

pub struct StreamingBackend<W: Write> {
    writer: IncrementalPdfWriter<W>,
    width: f32,
    height: f32,
    fonts: [ObjectId; 2],
    content: Vec<u8>,
    page_images: Vec<(String, ObjectId)>,
    image_count: usize,
    image_profile: ImageProfile,
}

impl<W: Write> StreamingBackend<W> {
    pub fn new(
        writer: W,
        title: &str,
        geometry: PageGeometry,
        image_profile: ImageProfile,
    ) -> Result<Self, RenderError> {
        let mut writer = IncrementalPdfWriter::new(writer, title)?;
        let mut font = |face: Face| {
            writer.add_object(&Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => face.base_font(),
                "Encoding" => "WinAnsiEncoding",
            }))
        };
        let fonts = [font(Face::Regular)?, font(Face::Bold)?];

        Ok(Self {
            writer,
            width: geometry.width,
            height: geometry.height,
            fonts,
            content: Vec::new(),
            page_images: Vec::new(),
            image_count: 0,
            image_profile,
        })
    }

    fn pdf_y(&self, y: f32) -> f32 {
        self.height - y
    }

    /// Write the current page's content stream and page object
    fn flush_page(&mut self) -> Result<(), RenderError> {
        let content = std::mem::take(&mut self.content);
        let stream = match deflate_stream(&content) {
            Some(compressed) => Stream::new(dictionary! { "Filter" => "FlateDecode" }, compressed),
            None => Stream::new(dictionary! {}, content),
        };
        let content_id = self.writer.add_object(&Object::Stream(stream))?;

        let mut xobjects = Dictionary::new();
        for (name, id) in self.page_images.drain(..) {
            xobjects.set(name, id);
        }
        let resources = dictionary! {
            "Font" => dictionary! {
                "F1" => self.fonts[0],
                "F2" => self.fonts[1],
            },
            "XObject" => xobjects,
        };

        self.writer.add_page(dictionary! {
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(self.width),
                Object::Real(self.height),
            ],
            "Resources" => resources,
            "Contents" => content_id,
        })?;
        Ok(())
    }

    /// JPEG bytes and PDF color space for an image. Baseline JPEGs in gray or
    /// RGB pass through untouched; everything else is re-encoded.
    fn jpeg_for(&self, bytes: &[u8]) -> Result<(Vec<u8>, u32, u32, &'static str), RenderError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| RenderError::ImageEmbed(e.to_string()))?;
        let format = reader.format();
        let img = reader
            .decode()
            .map_err(|e| RenderError::ImageEmbed(e.to_string()))?;
        let (width, height) = (img.width(), img.height());

        if format == Some(ImageFormat::Jpeg) {
            match img.color() {
                ColorType::Rgb8 => return Ok((bytes.to_vec(), width, height, "DeviceRGB")),
                ColorType::L8 => return Ok((bytes.to_vec(), width, height, "DeviceGray")),
                _ => {}
            }
        }

        let rgb = flatten_onto_white(&img);
        let jpeg = encode_jpeg(&rgb, self.image_profile.quality)
            .map_err(|e| RenderError::ImageEmbed(e.to_string()))?;
        Ok((jpeg, width, height, "DeviceRGB"))
    }

    pub fn page_count(&self) -> usize {
        self.writer.page_count()
    }
}

impl<W: Write> DrawBackend for StreamingBackend<W> {
    type Output = W;

    fn draw_text(
        &mut self,
        content: &str,
        position: Point,
        style: &TextStyle,
    ) -> Result<(), RenderError> {
        if content.is_empty() {
            return Ok(());
        }
        let width = measurer(style.face).width_pt(content, style.font_size);
        let x = aligned_start(position.x, width, style.align);
        let y = self.pdf_y(position.y);
        let encoded: Vec<u8> = content
            .chars()
            .map(|c| win_ansi_byte(c).unwrap_or(b'?'))
            .collect();

        write!(
            self.content,
            "BT /{} {:.2} Tf {} rg {:.2} {:.2} Td (",
            font_resource(style.face),
            style.font_size,
            rgb_operands(style.color),
            x,
            y
        )?;
        self.content.extend_from_slice(&escape_literal(&encoded));
        self.content.extend_from_slice(b") Tj ET\n");
        Ok(())
    }

    fn draw_rect(
        &mut self,
        position: Point,
        size: Size,
        color: Color,
        opacity: f32,
    ) -> Result<(), RenderError> {
        let fill = color.over_white(opacity);
        let bottom = self.pdf_y(position.y + size.height);
        writeln!(
            self.content,
            "q {} rg {:.2} {:.2} {:.2} {:.2} re f Q",
            rgb_operands(fill),
            position.x,
            bottom,
            size.width,
            size.height
        )?;
        Ok(())
    }

    fn embed_image(
        &mut self,
        bytes: &[u8],
        position: Point,
        size: Size,
    ) -> Result<(), RenderError> {
        let (jpeg, px_width, px_height, color_space) = self.jpeg_for(bytes)?;
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => px_width as i64,
                "Height" => px_height as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8i64,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );
        let id = self.writer.add_object(&Object::Stream(image))?;

        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        let bottom = self.pdf_y(position.y + size.height);
        writeln!(
            self.content,
            "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /{} Do Q",
            size.width, size.height, position.x, bottom, name
        )?;
        self.page_images.push((name, id));
        Ok(())
    }

    fn new_page(&mut self) -> Result<(), RenderError> {
        self.flush_page()
    }

    fn finalize(mut self) -> Result<W, RenderError> {
        self.flush_page()?;
        log::debug!(
            "Streaming backend finished {} pages ({} bytes)",
            self.writer.page_count(),
            self.writer.bytes_written()
        );
        Ok(self.writer.finish()?)
    }
}

/// `io::Write` sink that forwards fixed-size chunks over a channel.
///
/// A closed receiver does not stop the writer: the remaining output is still
/// produced (and optionally retained) but no longer sent.
pub struct ChannelWriter {
    sender: async_channel::Sender<Vec<u8>>,
    buffer: Vec<u8>,
    chunk_size: usize,
    retained: Option<Vec<u8>>,
    max_retained: usize,
    written: u64,
    disconnected: bool,
}

impl ChannelWriter {
    pub fn new(
        sender: async_channel::Sender<Vec<u8>>,
        settings: &StreamSettings,
        retain: bool,
    ) -> Self {
        Self {
            sender,
            buffer: Vec::with_capacity(settings.chunk_size),
            chunk_size: settings.chunk_size.max(1),
            retained: retain.then(Vec::new),
            max_retained: settings.max_cached_bytes,
            written: 0,
            disconnected: false,
        }
    }

    fn send_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let chunk = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.chunk_size));
        if self.disconnected {
            return;
        }
        if self.sender.send_blocking(chunk).is_err() {
            log::info!("Stream consumer went away; finishing render without sending");
            self.disconnected = true;
        }
    }

    /// The full document, if retention was requested and it stayed under the cap
    pub fn into_retained(mut self) -> Option<Vec<u8>> {
        self.send_buffer();
        self.retained.take()
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written += buf.len() as u64;
        if let Some(retained) = self.retained.as_mut() {
            if retained.len() + buf.len() > self.max_retained {
                log::debug!("Stream exceeds {} bytes; not retaining", self.max_retained);
                self.retained = None;
            } else {
                retained.extend_from_slice(buf);
            }
        }

        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= self.chunk_size {
            self.send_buffer();
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffer();
        Ok(())
    }
}

/// Outcome of a finished stream
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub pages: usize,
    pub bytes_written: u64,
    /// Whole document, when retained
    pub document: Option<Vec<u8>>,
}

/// Chunks of a document being rendered on a blocking thread
pub struct DocumentStream {
    chunks: async_channel::Receiver<Vec<u8>>,
    task: tokio::task::JoinHandle<Result<StreamSummary, RenderError>>,
}

impl DocumentStream {
    /// Stream an already rendered document, e.g. one served from cache.
    /// Its summary reports zero pages.
    pub fn from_document(document: Vec<u8>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let chunk_count = document.len().div_ceil(chunk_size).max(1);
        let (sender, chunks) = async_channel::bounded(chunk_count);
        for chunk in document.chunks(chunk_size) {
            // Capacity covers every chunk, so this never fails
            let _ = sender.try_send(chunk.to_vec());
        }
        drop(sender);

        let bytes_written = document.len() as u64;
        let task = tokio::spawn(async move {
            Ok(StreamSummary {
                pages: 0,
                bytes_written,
                document: Some(document),
            })
        });
        DocumentStream { chunks, task }
    }

    /// Next chunk, or `None` once the document is complete (or failed)
    pub async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        self.chunks.recv().await.ok()
    }

    /// Stop consuming and wait for rendering to complete
    pub async fn finish(self) -> Result<StreamSummary, RenderError> {
        drop(self.chunks);
        self.task
            .await
            .map_err(|e| RenderError::TaskAborted(e.to_string()))?
    }

    /// Read the whole stream into memory
    pub async fn collect(mut self) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            out.extend_from_slice(&chunk);
        }
        self.finish().await?;
        Ok(out)
    }
}

/// Everything a streamed render needs, owned so it can move to a worker thread
pub struct StreamJob {
    pub title: String,
    pub blocks: Vec<LayoutBlock>,
    pub geometry: PageGeometry,
    pub settings: Settings,
    /// Keep a copy of the output (up to the configured cap) in the summary
    pub retain: bool,
    /// Called with the retained document once rendering completes, whether or
    /// not anyone is still reading the stream
    pub on_complete: Option<Box<dyn FnOnce(&[u8]) + Send>>,
}

/// Lay out and paint `job` on a blocking thread, streaming the output
pub fn spawn_stream(job: StreamJob) -> DocumentStream {
    let (sender, chunks) = async_channel::bounded(job.settings.stream.channel_capacity.max(1));

    let task = tokio::task::spawn_blocking(move || {
        let sink = ChannelWriter::new(sender, &job.settings.stream, job.retain);
        let profile = job.settings.images.streaming;
        let mut backend = StreamingBackend::new(sink, &job.title, job.geometry, profile)?;

        let layout = layout_document(&job.blocks, job.geometry, &job.settings);
        paint(&layout, &job.blocks, &job.settings, &mut backend)?;
        let pages = backend.page_count() + 1;

        let sink = backend.finalize()?;
        let bytes_written = sink.written;
        let document = sink.into_retained();
        if let (Some(on_complete), Some(document)) = (job.on_complete, document.as_deref()) {
            on_complete(document);
        }
        log::info!("Streamed {} pages ({} bytes)", pages, bytes_written);
        Ok(StreamSummary {
            pages,
            bytes_written,
            document,
        })
    });

    DocumentStream { chunks, task }
}
