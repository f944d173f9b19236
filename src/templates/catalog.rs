use serde::Serialize;
use std::collections::HashMap;

use super::layout::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Minimal,
    Professional,
    Creative,
    Modern,
    Classic,
}

impl TemplateCategory {
    pub const ALL: [TemplateCategory; 5] = [
        TemplateCategory::Minimal,
        TemplateCategory::Professional,
        TemplateCategory::Creative,
        TemplateCategory::Modern,
        TemplateCategory::Classic,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TemplateCategory::Minimal => "Minimal",
            TemplateCategory::Professional => "Professional",
            TemplateCategory::Creative => "Creative",
            TemplateCategory::Modern => "Modern",
            TemplateCategory::Classic => "Classic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label().eq_ignore_ascii_case(value))
    }
}

/// Entrada inmutable del catálogo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: TemplateCategory,
    pub color: &'static str,
    pub accent_color: &'static str,
    pub popular: bool,
    #[serde(rename = "new")]
    pub is_new: bool,
    pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub id: TemplateCategory,
    pub label: &'static str,
    pub count: usize,
}

pub static CATALOG: [TemplateDescriptor; 15] = [
    // Minimal
    TemplateDescriptor {
        id: "minimal",
        name: "Minimal",
        description: "Clean lines, maximum clarity",
        category: TemplateCategory::Minimal,
        color: "#92487A",
        accent_color: "#E49BA6",
        popular: true,
        is_new: false,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                items: ItemsStyle::List,
                title: "Invoice",
                ..StyleTokens::BASE
            },
        ),
    },
    TemplateDescriptor {
        id: "clean-slate",
        name: "Clean Slate",
        description: "Pure simplicity, zero distractions",
        category: TemplateCategory::Minimal,
        color: "#64748B",
        accent_color: "#94A3B8",
        popular: false,
        is_new: false,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                header: HeaderStyle::SenderLeft,
                title: "Invoice",
                recipient_label: "Billed To",
                recipient_placeholder: "Client",
                ..StyleTokens::BASE
            },
        ),
    },
    TemplateDescriptor {
        id: "nordic",
        name: "Nordic",
        description: "Scandinavian-inspired minimalism",
        category: TemplateCategory::Minimal,
        color: "#1E293B",
        accent_color: "#475569",
        popular: false,
        is_new: true,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                header: HeaderStyle::SenderLeft,
                totals_align: TotalsAlign::Full,
                background: Some("#FAFAFA"),
                title: "Invoice",
                recipient_label: "Client",
                sender_placeholder: "Nordic Studio",
                ..StyleTokens::BASE
            },
        ),
    },
    // Professional
    TemplateDescriptor {
        id: "corporate",
        name: "Corporate",
        description: "Enterprise-grade professionalism",
        category: TemplateCategory::Professional,
        color: "#0F172A",
        accent_color: "#334155",
        popular: true,
        is_new: false,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                header: HeaderStyle::Banner,
                items: ItemsStyle::FilledHeader,
                recipient_label: "Billed To",
                total_label: "Total Due",
                sender_placeholder: "CORPORATE INC.",
                footer: "Payment Terms: Net 14",
                ..StyleTokens::BASE
            },
        ),
    },
    TemplateDescriptor {
        id: "executive",
        name: "Executive",
        description: "C-suite approved design",
        category: TemplateCategory::Professional,
        color: "#1E3A5F",
        accent_color: "#3B82F6",
        popular: false,
        is_new: false,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                header: HeaderStyle::SenderLeft,
                items: ItemsStyle::FilledHeader,
                recipient_label: "BILL TO",
                sender_placeholder: "Executive Corp",
                ..StyleTokens::BASE
            },
        ),
    },
    TemplateDescriptor {
        id: "consultant",
        name: "Consultant",
        description: "Perfect for advisory services",
        category: TemplateCategory::Professional,
        color: "#374151",
        accent_color: "#6B7280",
        popular: false,
        is_new: false,
        layout: Layout::new(
            NOTES_FIRST_SECTIONS,
            StyleTokens {
                items: ItemsStyle::Striped,
                title: "Invoice",
                recipient_label: "Client",
                sender_placeholder: "Consulting Services",
                ..StyleTokens::BASE
            },
        ),
    },
    // Creative
    TemplateDescriptor {
        id: "creative",
        name: "Creative",
        description: "Bold colors, bold statements",
        category: TemplateCategory::Creative,
        color: "#3B82F6",
        accent_color: "#60A5FA",
        popular: true,
        is_new: false,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                header: HeaderStyle::Sidebar,
                title: "Invoice",
                total_label: "Total Amount",
                sender_placeholder: "Creative Studio",
                recipient_placeholder: "Client Company",
                ..StyleTokens::BASE
            },
        ),
    },
    TemplateDescriptor {
        id: "studio",
        name: "Studio",
        description: "For design agencies & creatives",
        category: TemplateCategory::Creative,
        color: "#EC4899",
        accent_color: "#F472B6",
        popular: false,
        is_new: true,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                header: HeaderStyle::Banner,
                items: ItemsStyle::Striped,
                totals_align: TotalsAlign::Full,
                title: "Invoice",
                recipient_label: "Client",
                total_label: "Total Amount",
                sender_placeholder: "STUDIO",
                ..StyleTokens::BASE
            },
        ),
    },
    TemplateDescriptor {
        id: "neon",
        name: "Neon",
        description: "Electric vibes, modern edge",
        category: TemplateCategory::Creative,
        color: "#8B5CF6",
        accent_color: "#A78BFA",
        popular: false,
        is_new: false,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                header: HeaderStyle::Banner,
                items: ItemsStyle::FilledHeader,
                theme: Theme::Dark,
                total_label: "Total Due",
                ..StyleTokens::BASE
            },
        ),
    },
    // Modern
    TemplateDescriptor {
        id: "startup",
        name: "Startup",
        description: "Tech-forward, investor-ready",
        category: TemplateCategory::Modern,
        color: "#8B5CF6",
        accent_color: "#A78BFA",
        popular: true,
        is_new: false,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                header: HeaderStyle::SenderLeft,
                typeface: Typeface::Mono,
                theme: Theme::Dark,
                title: "Invoice",
                recipient_label: "To",
                sender_placeholder: "Startup.io",
                recipient_placeholder: "Tech Company Inc.",
                ..StyleTokens::BASE
            },
        ),
    },
    TemplateDescriptor {
        id: "saas",
        name: "SaaS",
        description: "Subscription billing made beautiful",
        category: TemplateCategory::Modern,
        color: "#06B6D4",
        accent_color: "#22D3EE",
        popular: false,
        is_new: true,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                items: ItemsStyle::FilledHeader,
                title: "Invoice",
                recipient_label: "Billed To",
                ..StyleTokens::BASE
            },
        ),
    },
    TemplateDescriptor {
        id: "fintech",
        name: "Fintech",
        description: "Financial services aesthetic",
        category: TemplateCategory::Modern,
        color: "#10B981",
        accent_color: "#34D399",
        popular: false,
        is_new: false,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                header: HeaderStyle::SenderLeft,
                items: ItemsStyle::Striped,
                typeface: Typeface::Mono,
                title: "Invoice",
                recipient_label: "Client",
                total_label: "Total Amount",
                sender_placeholder: "FinTech",
                ..StyleTokens::BASE
            },
        ),
    },
    // Classic
    TemplateDescriptor {
        id: "classic",
        name: "Classic",
        description: "Timeless, trusted, traditional",
        category: TemplateCategory::Classic,
        color: "#DC2626",
        accent_color: "#EF4444",
        popular: false,
        is_new: false,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                items: ItemsStyle::FilledHeader,
                typeface: Typeface::Serif,
                sender_label: "FROM:",
                recipient_label: "TO:",
                sender_placeholder: "Classic Business Co.",
                recipient_placeholder: "Client Corporation",
                default_notes: Some("Payment due within 14 days. Thank you for your business."),
                ..StyleTokens::BASE
            },
        ),
    },
    TemplateDescriptor {
        id: "elegant",
        name: "Elegant",
        description: "Refined luxury aesthetic",
        category: TemplateCategory::Classic,
        color: "#059669",
        accent_color: "#10B981",
        popular: false,
        is_new: false,
        layout: Layout::new(
            STANDARD_SECTIONS,
            StyleTokens {
                header: HeaderStyle::Centered,
                totals_align: TotalsAlign::Center,
                typeface: Typeface::Serif,
                title: "Invoice",
                recipient_label: "Prepared For",
                total_label: "Total Amount Due",
                sender_placeholder: "Elegant & Co.",
                recipient_placeholder: "Distinguished Client",
                ..StyleTokens::BASE
            },
        ),
    },
    TemplateDescriptor {
        id: "heritage",
        name: "Heritage",
        description: "Old-world charm, modern function",
        category: TemplateCategory::Classic,
        color: "#92400E",
        accent_color: "#B45309",
        popular: false,
        is_new: false,
        layout: Layout::new(
            NOTES_FIRST_SECTIONS,
            StyleTokens {
                header: HeaderStyle::Centered,
                items: ItemsStyle::Striped,
                typeface: Typeface::Serif,
                background: Some("#FDF8F3"),
                title: "Invoice",
                recipient_label: "Invoice To",
                sender_placeholder: "Heritage & Sons",
                ..StyleTokens::BASE
            },
        ),
    },
];

/// Registro de plantillas indexado por id.
pub struct TemplateCatalog {
    templates: HashMap<&'static str, &'static TemplateDescriptor>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        let templates = CATALOG.iter().map(|t| (t.id, t)).collect();
        Self { templates }
    }

    pub fn get(&self, template_id: &str) -> Option<&'static TemplateDescriptor> {
        self.templates.get(template_id).copied()
    }

    /// Como `get`, pero los ids desconocidos caen en la primera plantilla.
    pub fn resolve(&self, template_id: &str) -> &'static TemplateDescriptor {
        self.get(template_id).unwrap_or(&CATALOG[0])
    }

    pub fn default_template(&self) -> &'static TemplateDescriptor {
        &CATALOG[0]
    }

    /// Todas las plantillas en el orden del catálogo.
    pub fn list(&self) -> &'static [TemplateDescriptor] {
        &CATALOG
    }

    pub fn by_category(&self, category: TemplateCategory) -> Vec<&'static TemplateDescriptor> {
        CATALOG.iter().filter(|t| t.category == category).collect()
    }

    pub fn categories(&self) -> Vec<CategorySummary> {
        TemplateCategory::ALL
            .iter()
            .map(|&category| CategorySummary {
                id: category,
                label: category.label(),
                count: CATALOG.iter().filter(|t| t.category == category).count(),
            })
            .collect()
    }

    pub fn exists(&self, template_id: &str) -> bool {
        self.templates.contains_key(template_id)
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Rgb;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_fifteen_unique_templates() {
        let catalog = TemplateCatalog::new();
        assert_eq!(catalog.list().len(), 15);

        let ids: HashSet<_> = catalog.list().iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 15);
        assert!(catalog.exists("heritage"));
    }

    #[test]
    fn every_category_has_three_templates() {
        let catalog = TemplateCatalog::new();
        for summary in catalog.categories() {
            assert_eq!(summary.count, 3, "{}", summary.label);
            assert_eq!(catalog.by_category(summary.id).len(), 3);
        }
    }

    #[test]
    fn unknown_id_resolves_to_first_entry() {
        let catalog = TemplateCatalog::new();
        assert!(catalog.get("vaporwave").is_none());
        assert_eq!(catalog.resolve("vaporwave").id, "minimal");
        assert_eq!(catalog.resolve("studio").color, "#EC4899");
    }

    #[test]
    fn colors_are_valid_hex() {
        for t in CATALOG.iter() {
            for hex in [t.color, t.accent_color] {
                assert_eq!(Rgb::from_hex(hex).to_hex(), hex, "{}", t.id);
            }
        }
    }

    #[test]
    fn every_layout_draws_the_required_sections() {
        for t in CATALOG.iter() {
            for section in [Section::Header, Section::Parties, Section::Items, Section::Totals] {
                assert!(t.layout.has(section), "{} lacks {:?}", t.id, section);
            }
        }
    }

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(TemplateCategory::parse("modern"), Some(TemplateCategory::Modern));
        assert_eq!(TemplateCategory::parse("CLASSIC"), Some(TemplateCategory::Classic));
        assert_eq!(TemplateCategory::parse("retro"), None);
    }
}
