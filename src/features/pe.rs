//! PE container parsing into a [`StructuralSummary`].
//!
//! Headers are validated first; anything wrong there is a [`FormatError`].
//! The full parse (section table, import directory) runs only after the
//! headers check out, and section bytes are sliced out of the image one
//! section at a time when their entropy is needed. Files are memory-mapped,
//! so regions that are never touched are never read.

use super::entropy::shannon_entropy;
use super::normalize::Normalizer;
use super::{FeatureSchema, FeatureVector};
use crate::error::{ExtractionError, FeatureError, FormatError};
use goblin::pe::header::Header;
use goblin::pe::options::ParseOptions;
use goblin::pe::section_table::IMAGE_SCN_MEM_EXECUTE;
use goblin::pe::PE;
use memmap2::Mmap;
use serde::Serialize;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

const DOS_SIGNATURE: u16 = 0x5a4d; // "MZ"
const PE_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"
const DOS_HEADER_LEN: usize = 64;
const PE_SIGNATURE_LEN: usize = 4;
const COFF_HEADER_LEN: usize = 20;
const SECTION_HEADER_LEN: usize = 40;

/// Read-only mapping of an executable on disk.
pub struct ExecutableImage {
    map: Mmap,
}

impl ExecutableImage {
    /// Map `path` read-only. Files larger than `max_bytes` are rejected before mapping.
    pub fn open(path: &Path, max_bytes: u64) -> Result<Self, FeatureError> {
        let file = File::open(path).map_err(ExtractionError::Io)?;
        let size = file.metadata().map_err(ExtractionError::Io)?.len();
        if size > max_bytes {
            return Err(ExtractionError::TooLarge {
                size,
                limit: max_bytes,
            }
            .into());
        }
        if size < DOS_HEADER_LEN as u64 {
            return Err(FormatError::new(format!("file is {} bytes, shorter than a DOS header", size)).into());
        }
        // SAFETY: the map is read-only and private to this image; it is
        // dropped (and the file handle with it) on every return path.
        let map = unsafe { Mmap::map(&file) }.map_err(ExtractionError::Io)?;
        Ok(Self { map })
    }
}

impl Deref for ExecutableImage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}

/// COFF file header fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileHeaderSummary {
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

/// Optional header fields; absent for object files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptionalHeaderSummary {
    pub magic: u16,
    pub address_of_entry_point: u64,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub checksum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
    pub number_of_rva_and_sizes: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SectionRecord {
    pub name: String,
    pub raw_size: u32,
    pub virtual_size: u32,
    pub executable: bool,
    pub entropy: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    /// Distinct imported modules.
    pub dll_count: usize,
    /// Imported symbols across all modules.
    pub function_count: usize,
}

/// Everything the feature catalog reads from one executable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StructuralSummary {
    pub file_header: FileHeaderSummary,
    pub optional_header: Option<OptionalHeaderSummary>,
    pub sections: Vec<SectionRecord>,
    pub imports: ImportSummary,
}

impl StructuralSummary {
    /// Parse headers, section table and import directory of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, FeatureError> {
        let header = parse_headers(bytes)?;
        // No feature reads the certificate table, so it is never parsed.
        let opts = ParseOptions {
            parse_attribute_certificates: false,
            ..ParseOptions::default()
        };
        let pe = PE::parse_with_opts(bytes, &opts).map_err(ExtractionError::Malformed)?;

        let file_header = {
            let coff = &header.coff_header;
            FileHeaderSummary {
                machine: coff.machine,
                number_of_sections: coff.number_of_sections,
                time_date_stamp: coff.time_date_stamp,
                pointer_to_symbol_table: coff.pointer_to_symbol_table,
                number_of_symbols: coff.number_of_symbol_table,
                size_of_optional_header: coff.size_of_optional_header,
                characteristics: coff.characteristics,
            }
        };

        let optional_header = header.optional_header.as_ref().map(|opt| {
            let standard = &opt.standard_fields;
            let win = &opt.windows_fields;
            OptionalHeaderSummary {
                magic: standard.magic,
                address_of_entry_point: standard.address_of_entry_point as u64,
                image_base: win.image_base as u64,
                section_alignment: win.section_alignment,
                file_alignment: win.file_alignment,
                major_operating_system_version: win.major_operating_system_version,
                minor_operating_system_version: win.minor_operating_system_version,
                size_of_image: win.size_of_image,
                size_of_headers: win.size_of_headers,
                checksum: win.check_sum,
                subsystem: win.subsystem,
                dll_characteristics: win.dll_characteristics,
                number_of_rva_and_sizes: win.number_of_rva_and_sizes,
            }
        });

        let sections = pe
            .sections
            .iter()
            .map(|s| SectionRecord {
                name: String::from_utf8_lossy(&s.name)
                    .trim_end_matches('\0')
                    .to_string(),
                raw_size: s.size_of_raw_data,
                virtual_size: s.virtual_size,
                executable: s.characteristics & IMAGE_SCN_MEM_EXECUTE != 0,
                entropy: shannon_entropy(section_bytes(
                    bytes,
                    s.pointer_to_raw_data,
                    s.size_of_raw_data,
                )),
            })
            .collect();

        let imports = ImportSummary {
            dll_count: pe.libraries.len(),
            function_count: pe.imports.len(),
        };

        Ok(Self {
            file_header,
            optional_header,
            sections,
            imports,
        })
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn executable_section_count(&self) -> usize {
        self.sections.iter().filter(|s| s.executable).count()
    }

    /// Entropy of the first executable section, not an aggregate.
    pub fn first_executable_entropy(&self) -> Option<f64> {
        self.sections.iter().find(|s| s.executable).map(|s| s.entropy)
    }

    pub fn mean_entropy(&self) -> f64 {
        mean(self.sections.iter().map(|s| s.entropy))
    }

    pub fn max_entropy(&self) -> f64 {
        self.sections
            .iter()
            .map(|s| s.entropy)
            .fold(None, |acc: Option<f64>, e| Some(acc.map_or(e, |a| a.max(e))))
            .unwrap_or(0.0)
    }

    pub fn min_entropy(&self) -> f64 {
        self.sections
            .iter()
            .map(|s| s.entropy)
            .fold(None, |acc: Option<f64>, e| Some(acc.map_or(e, |a| a.min(e))))
            .unwrap_or(0.0)
    }

    pub fn mean_virtual_size(&self) -> f64 {
        mean(self.sections.iter().map(|s| s.virtual_size as f64))
    }

    pub fn mean_raw_size(&self) -> f64 {
        mean(self.sections.iter().map(|s| s.raw_size as f64))
    }

    pub fn total_raw_size(&self) -> f64 {
        self.sections.iter().map(|s| s.raw_size as f64).sum()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Header stage. Signature and truncation problems are format errors.
fn parse_headers(bytes: &[u8]) -> Result<Header, FormatError> {
    if bytes.len() < DOS_HEADER_LEN {
        return Err(FormatError::new(format!(
            "{} bytes is shorter than a DOS header",
            bytes.len()
        )));
    }
    let header = Header::parse(bytes).map_err(|e| FormatError::new(e.to_string()))?;
    if header.dos_header.signature != DOS_SIGNATURE {
        return Err(FormatError::new("DOS signature mismatch"));
    }
    if header.signature != PE_SIGNATURE {
        return Err(FormatError::new("PE signature mismatch"));
    }
    let coff = &header.coff_header;
    let table_end = header.dos_header.pe_pointer as usize
        + PE_SIGNATURE_LEN
        + COFF_HEADER_LEN
        + coff.size_of_optional_header as usize
        + coff.number_of_sections as usize * SECTION_HEADER_LEN;
    if table_end > bytes.len() {
        return Err(FormatError::new(format!(
            "section table ends at {:#x}, past the end of the {}-byte file",
            table_end,
            bytes.len()
        )));
    }
    Ok(header)
}

/// Raw bytes of a section, clipped to the end of the image.
fn section_bytes(bytes: &[u8], pointer: u32, size: u32) -> &[u8] {
    let start = pointer as usize;
    if start >= bytes.len() {
        return &[];
    }
    let end = start.saturating_add(size as usize).min(bytes.len());
    &bytes[start..end]
}

/// Extract the schema-ordered vector for the executable at `path`.
pub fn extract_executable(
    path: &Path,
    schema: &Arc<FeatureSchema>,
    max_bytes: u64,
) -> Result<FeatureVector, FeatureError> {
    let image = ExecutableImage::open(path, max_bytes)?;
    let vector = extract_executable_bytes(&image, schema)?;
    tracing::debug!(path = %path.display(), features = vector.len(), "static features extracted");
    Ok(vector)
}

/// Same as [`extract_executable`] for bytes already in memory.
pub fn extract_executable_bytes(
    bytes: &[u8],
    schema: &Arc<FeatureSchema>,
) -> Result<FeatureVector, FeatureError> {
    let summary = StructuralSummary::parse(bytes)?;
    tracing::debug!(
        sections = summary.section_count(),
        executable_sections = summary.executable_section_count(),
        dlls = summary.imports.dll_count,
        functions = summary.imports.function_count,
        "parsed PE structure"
    );
    Ok(Normalizer::new(Arc::clone(schema)).from_summary(&summary))
}
