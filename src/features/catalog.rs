//! Registry of feature names computable from a [`StructuralSummary`].
//!
//! A trained schema may contain any subset of these names, plus names the
//! extractor knows nothing about; the latter keep their 0.0 default.

use super::pe::StructuralSummary;
use std::collections::HashMap;
use std::sync::OnceLock;

type Extractor = fn(&StructuralSummary) -> f64;

fn optional(s: &StructuralSummary, f: impl Fn(&super::OptionalHeaderSummary) -> f64) -> f64 {
    s.optional_header.as_ref().map_or(0.0, f)
}

const ENTRIES: &[(&str, Extractor)] = &[
    // File header
    ("header.machine", |s| s.file_header.machine as f64),
    ("header.numberofsections", |s| s.file_header.number_of_sections as f64),
    ("header.timedatestamp", |s| s.file_header.time_date_stamp as f64),
    ("header.pointertosymboltable", |s| s.file_header.pointer_to_symbol_table as f64),
    ("header.numberofsymbols", |s| s.file_header.number_of_symbols as f64),
    ("header.sizeofoptionalheader", |s| s.file_header.size_of_optional_header as f64),
    ("header.characteristics", |s| s.file_header.characteristics as f64),
    // Optional header
    ("optional.magic", |s| optional(s, |o| o.magic as f64)),
    ("optional.addressofentrypoint", |s| optional(s, |o| o.address_of_entry_point as f64)),
    ("optional.imagebase", |s| optional(s, |o| o.image_base as f64)),
    ("optional.sectionalignment", |s| optional(s, |o| o.section_alignment as f64)),
    ("optional.filealignment", |s| optional(s, |o| o.file_alignment as f64)),
    ("optional.majoroperatingsystemversion", |s| optional(s, |o| o.major_operating_system_version as f64)),
    ("optional.minoroperatingsystemversion", |s| optional(s, |o| o.minor_operating_system_version as f64)),
    ("optional.sizeofimage", |s| optional(s, |o| o.size_of_image as f64)),
    ("optional.sizeofheaders", |s| optional(s, |o| o.size_of_headers as f64)),
    ("optional.checksum", |s| optional(s, |o| o.checksum as f64)),
    ("optional.subsystem", |s| optional(s, |o| o.subsystem as f64)),
    ("optional.dllcharacteristics", |s| optional(s, |o| o.dll_characteristics as f64)),
    ("optional.numberofrvaandsizes", |s| optional(s, |o| o.number_of_rva_and_sizes as f64)),
    // Section aggregates
    ("section.nsections", |s| s.file_header.number_of_sections as f64),
    ("section.executable_entropy", |s| s.first_executable_entropy().unwrap_or(0.0)),
    ("section.avg_entropy", StructuralSummary::mean_entropy),
    ("section.max_entropy", StructuralSummary::max_entropy),
    ("section.min_entropy", StructuralSummary::min_entropy),
    ("section.avg_virtualsize", StructuralSummary::mean_virtual_size),
    ("section.avg_rawsize", StructuralSummary::mean_raw_size),
    ("section.nexecutable", |s| s.executable_section_count() as f64),
    // Imports
    ("imports.ndlls", |s| s.imports.dll_count as f64),
    ("imports.nfuncs", |s| s.imports.function_count as f64),
    // Memory-forensics names kept from the training dataset. These are static
    // stand-ins, not the runtime quantities their names describe.
    ("pslist.nproc", |s| s.file_header.number_of_sections as f64),
    ("handles.nfile", StructuralSummary::total_raw_size),
    ("callbacks.ncallbacks", |s| s.imports.dll_count as f64),
    ("dlllist.ndlls", |s| s.imports.dll_count as f64),
];

/// Name → extraction function lookup.
pub struct FeatureCatalog {
    entries: HashMap<&'static str, Extractor>,
}

impl FeatureCatalog {
    /// Process-wide immutable catalog.
    pub fn global() -> &'static FeatureCatalog {
        static CATALOG: OnceLock<FeatureCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| FeatureCatalog {
            entries: ENTRIES.iter().copied().collect(),
        })
    }

    /// Value of `name` for `summary`, or `None` if the name is not in the catalog.
    pub fn compute(&self, name: &str, summary: &StructuralSummary) -> Option<f64> {
        self.entries.get(name).map(|f| f(summary))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Catalog names in declaration order.
pub fn catalog_names() -> impl Iterator<Item = &'static str> {
    ENTRIES.iter().map(|(name, _)| *name)
}
