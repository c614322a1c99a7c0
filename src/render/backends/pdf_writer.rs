//! Forward-only PDF object writer
//!
//! Objects are serialized as soon as they are complete, so memory use does not
//! grow with page count. Byte offsets for the cross-reference table are counted
//! while writing, which lets the sink be a pipe or channel instead of a file.

use std::collections::BTreeMap;
use std::io::{self, Write};

use lopdf::{dictionary, Dictionary, Object, ObjectId, StringFormat};

/// Counts bytes passed through to the inner writer
struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub struct IncrementalPdfWriter<W: Write> {
    out: CountingWriter<W>,
    offsets: BTreeMap<u32, u64>,
    max_id: u32,
    pages_id: ObjectId,
    catalog_id: ObjectId,
    info_id: ObjectId,
    page_ids: Vec<ObjectId>,
}

impl<W: Write> IncrementalPdfWriter<W> {
    /// Write the header. Ids for the page tree, catalog and info dictionary
    /// are reserved now and written by [`finish`](Self::finish).
    pub fn new(writer: W, title: &str) -> io::Result<Self> {
        let mut out = CountingWriter {
            inner: writer,
            written: 0,
        };
        out.write_all(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n")?;

        let mut this = Self {
            out,
            offsets: BTreeMap::new(),
            max_id: 3,
            pages_id: (1, 0),
            catalog_id: (2, 0),
            info_id: (3, 0),
            page_ids: Vec::new(),
        };

        let info = dictionary! {
            "Title" => Object::String(title.as_bytes().to_vec(), StringFormat::Literal),
            "Producer" => Object::String(b"report-pdf".to_vec(), StringFormat::Literal),
        };
        // Info is small and known now; write it early
        let info_id = this.info_id;
        this.write_object(info_id, &Object::Dictionary(info))?;
        Ok(this)
    }

    pub fn new_object_id(&mut self) -> ObjectId {
        self.max_id += 1;
        (self.max_id, 0)
    }

    pub fn pages_id(&self) -> ObjectId {
        self.pages_id
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn bytes_written(&self) -> u64 {
        self.out.written
    }

    /// Serialize an indirect object
    pub fn write_object(&mut self, id: ObjectId, object: &Object) -> io::Result<()> {
        self.offsets.insert(id.0, self.out.written);
        write!(self.out, "{} {} obj\n", id.0, id.1)?;
        serialize::write_object(&mut self.out, object)?;
        self.out.write_all(b"\nendobj\n")
    }

    /// Allocate an id and write `object` under it
    pub fn add_object(&mut self, object: &Object) -> io::Result<ObjectId> {
        let id = self.new_object_id();
        self.write_object(id, object)?;
        Ok(id)
    }

    /// Register a finished page dictionary. `/Parent` is filled in here.
    pub fn add_page(&mut self, mut page: Dictionary) -> io::Result<ObjectId> {
        page.set("Type", "Page");
        page.set("Parent", self.pages_id);
        let id = self.add_object(&Object::Dictionary(page))?;
        self.page_ids.push(id);
        Ok(id)
    }

    /// Write the page tree, catalog, cross-reference table and trailer
    pub fn finish(mut self) -> io::Result<W> {
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<Object>>(),
            "Count" => self.page_ids.len() as i64,
        };
        let pages_id = self.pages_id;
        self.write_object(pages_id, &Object::Dictionary(pages))?;

        let catalog = dictionary! { "Type" => "Catalog", "Pages" => self.pages_id };
        let catalog_id = self.catalog_id;
        self.write_object(catalog_id, &Object::Dictionary(catalog))?;

        let xref_start = self.out.written;
        self.write_xref()?;

        let trailer = dictionary! {
            "Size" => (self.max_id + 1) as i64,
            "Root" => self.catalog_id,
            "Info" => self.info_id,
        };
        self.out.write_all(b"trailer\n")?;
        serialize::write_dictionary(&mut self.out, &trailer)?;
        write!(self.out, "\nstartxref\n{}\n%%EOF\n", xref_start)?;

        self.out.flush()?;
        Ok(self.out.inner)
    }

    /// Single-section table; ids never written are marked free
    fn write_xref(&mut self) -> io::Result<()> {
        write!(self.out, "xref\n0 {}\n", self.max_id + 1)?;
        self.out.write_all(b"0000000000 65535 f \n")?;
        for id in 1..=self.max_id {
            match self.offsets.get(&id) {
                Some(offset) => write!(self.out, "{:010} 00000 n \n", offset)?,
                None => self.out.write_all(b"0000000000 65535 f \n")?,
            }
        }
        Ok(())
    }
}

mod serialize {
    use super::*;

    pub fn write_object(writer: &mut dyn Write, object: &Object) -> io::Result<()> {
        match object {
            Object::Null => writer.write_all(b"null"),
            Object::Boolean(b) => writer.write_all(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => write!(writer, "{}", i),
            Object::Real(r) => write!(writer, "{:.3}", r),
            Object::Name(n) => {
                writer.write_all(b"/")?;
                writer.write_all(n)
            }
            Object::String(s, StringFormat::Literal) => {
                writer.write_all(b"(")?;
                writer.write_all(&escape_literal(s))?;
                writer.write_all(b")")
            }
            Object::String(s, StringFormat::Hexadecimal) => {
                writer.write_all(b"<")?;
                for byte in s {
                    write!(writer, "{:02X}", byte)?;
                }
                writer.write_all(b">")
            }
            Object::Array(items) => {
                writer.write_all(b"[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writer.write_all(b" ")?;
                    }
                    write_object(writer, item)?;
                }
                writer.write_all(b"]")
            }
            Object::Dictionary(dict) => write_dictionary(writer, dict),
            Object::Stream(stream) => {
                let mut dict = stream.dict.clone();
                dict.set("Length", stream.content.len() as i64);
                write_dictionary(writer, &dict)?;
                writer.write_all(b"\nstream\n")?;
                writer.write_all(&stream.content)?;
                writer.write_all(b"\nendstream")
            }
            Object::Reference(id) => write!(writer, "{} {} R", id.0, id.1),
        }
    }

    pub fn write_dictionary(writer: &mut dyn Write, dict: &Dictionary) -> io::Result<()> {
        writer.write_all(b"<<")?;
        for (key, value) in dict.iter() {
            writer.write_all(b"/")?;
            writer.write_all(key)?;
            writer.write_all(b" ")?;
            write_object(writer, value)?;
            writer.write_all(b" ")?;
        }
        writer.write_all(b">>")
    }
}

/// Escape a byte string for a PDF literal `( ... )`
pub fn escape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    for &byte in bytes {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(byte),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal(b"a(b)c\\"), b"a\\(b\\)c\\\\".to_vec());
    }

    #[test]
    fn test_minimal_document_parses() {
        let mut writer = IncrementalPdfWriter::new(Vec::new(), "Report").unwrap();
        let content = lopdf::Stream::new(dictionary! {}, b"0 0 0 rg 10 10 50 50 re f".to_vec());
        let content_id = writer.add_object(&Object::Stream(content)).unwrap();
        writer
            .add_page(dictionary! {
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(200), Object::Integer(200)],
                "Contents" => content_id,
            })
            .unwrap();
        assert_eq!(writer.page_count(), 1);

        let bytes = writer.finish().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));

        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_offsets_track_bytes() {
        let mut writer = IncrementalPdfWriter::new(Vec::new(), "T").unwrap();
        let before = writer.bytes_written();
        writer.add_object(&Object::Integer(42)).unwrap();
        assert!(writer.bytes_written() > before);
    }
}
