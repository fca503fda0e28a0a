//! Per-domain canonical field schemas.
//!
//! Each domain declares a fixed, ordered field set. The order here defines
//! the column order of every artifact; the record source is free to return
//! rows with any internal layout.

use super::types::{ExportDomain, ExportFormat};

/// Expected type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Num,
    Date,
    Bool,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Num => "number",
            Self::Date => "date",
            Self::Bool => "boolean",
        }
    }
}

/// One declared field: name, expected type, required/optional
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn req(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
    }
}

const fn opt(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
    }
}

/// Fixed ordered schema for one export domain
#[derive(Debug, Clone, Copy)]
pub struct DomainSchema {
    pub domain: ExportDomain,
    /// Source table backing this domain
    pub table: &'static str,
    pub fields: &'static [FieldSpec],
}

impl DomainSchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// All domains currently support all three formats; the check stays
    /// explicit so a future restriction lands in one place.
    pub fn supports_format(&self, _format: ExportFormat) -> bool {
        true
    }
}

static FX_SCHEMA: DomainSchema = DomainSchema {
    domain: ExportDomain::Fx,
    table: "fx_rates",
    fields: &[
        req("currency_code", FieldKind::Str),
        req("buying_rate", FieldKind::Num),
        req("selling_rate", FieldKind::Num),
        req("rate_date", FieldKind::Date),
        opt("approved_by", FieldKind::Str),
    ],
};

static CUSTOMS_SCHEMA: DomainSchema = DomainSchema {
    domain: ExportDomain::Customs,
    table: "customs_declarations",
    fields: &[
        req("declaration_number", FieldKind::Str),
        req("exporter_name", FieldKind::Str),
        opt("hs_code", FieldKind::Str),
        req("declared_value", FieldKind::Num),
        req("cleared", FieldKind::Bool),
        opt("cleared_at", FieldKind::Date),
    ],
};

static QUALITY_SCHEMA: DomainSchema = DomainSchema {
    domain: ExportDomain::Quality,
    table: "quality_certificates",
    fields: &[
        req("certificate_number", FieldKind::Str),
        req("export_id", FieldKind::Str),
        req("quality_grade", FieldKind::Str),
        opt("cupping_score", FieldKind::Num),
        opt("certified_by", FieldKind::Str),
        opt("certified_at", FieldKind::Date),
    ],
};

static LOT_SCHEMA: DomainSchema = DomainSchema {
    domain: ExportDomain::LotVerification,
    table: "lot_verifications",
    fields: &[
        req("lot_number", FieldKind::Str),
        opt("warehouse_location", FieldKind::Str),
        opt("commodity_grade", FieldKind::Str),
        req("verified", FieldKind::Bool),
        opt("verified_at", FieldKind::Date),
    ],
};

static GENERIC_SCHEMA: DomainSchema = DomainSchema {
    domain: ExportDomain::Generic,
    table: "trade_exports",
    fields: &[
        req("export_id", FieldKind::Str),
        req("exporter_name", FieldKind::Str),
        req("commodity", FieldKind::Str),
        req("quantity_kg", FieldKind::Num),
        req("destination_country", FieldKind::Str),
        req("status", FieldKind::Str),
        req("created_at", FieldKind::Date),
    ],
};

impl ExportDomain {
    /// The canonical schema for this domain; dispatch is exhaustive so a new
    /// domain cannot be added without declaring its field set.
    pub fn schema(&self) -> &'static DomainSchema {
        match self {
            Self::Fx => &FX_SCHEMA,
            Self::Customs => &CUSTOMS_SCHEMA,
            Self::Quality => &QUALITY_SCHEMA,
            Self::LotVerification => &LOT_SCHEMA,
            Self::Generic => &GENERIC_SCHEMA,
        }
    }
}
