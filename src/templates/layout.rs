use serde::Serialize;

/// Bloques de un documento, en el orden en que se dibujan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Header,
    Parties,
    Items,
    Totals,
    Notes,
    Footer,
}

/// Disposición de la cabecera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderStyle {
    /// Título a la izquierda, emisor a la derecha.
    TitleLeft,
    /// Emisor a la izquierda, título y número a la derecha.
    SenderLeft,
    /// Franja de color a todo el ancho con texto claro.
    Banner,
    /// Todo centrado.
    Centered,
    /// Columna lateral de color con el emisor.
    Sidebar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemsStyle {
    /// Tabla con cabecera en el color primario como texto.
    Plain,
    /// Cabecera rellena con el color primario.
    FilledHeader,
    /// Filas alternas sombreadas.
    Striped,
    /// Lista `descripción / cantidad × tarifa`.
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalsAlign {
    Right,
    Full,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Typeface {
    Sans,
    Serif,
    Mono,
}

impl Typeface {
    pub fn css_stack(&self) -> &'static str {
        match self {
            Typeface::Sans => "'Helvetica Neue', Helvetica, Arial, sans-serif",
            Typeface::Serif => "Georgia, 'Times New Roman', serif",
            Typeface::Mono => "'SFMono-Regular', Menlo, Consolas, monospace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
}

/// Tokens de estilo de una plantilla.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StyleTokens {
    pub header: HeaderStyle,
    pub items: ItemsStyle,
    pub totals_align: TotalsAlign,
    pub typeface: Typeface,
    pub theme: Theme,
    /// Fondo de página (`#RRGGBB`); `None` usa el del tema.
    pub background: Option<&'static str>,
    pub title: &'static str,
    pub sender_label: &'static str,
    pub recipient_label: &'static str,
    pub total_label: &'static str,
    pub sender_placeholder: &'static str,
    pub recipient_placeholder: &'static str,
    pub default_notes: Option<&'static str>,
    pub footer: &'static str,
}

impl StyleTokens {
    /// Base común; cada plantilla sobrescribe lo que la distingue.
    pub const BASE: StyleTokens = StyleTokens {
        header: HeaderStyle::TitleLeft,
        items: ItemsStyle::Plain,
        totals_align: TotalsAlign::Right,
        typeface: Typeface::Sans,
        theme: Theme::Light,
        background: None,
        title: "INVOICE",
        sender_label: "From",
        recipient_label: "Bill To",
        total_label: "Total",
        sender_placeholder: "Your Company",
        recipient_placeholder: "Client Name",
        default_notes: None,
        footer: "Thank you for your business!",
    };

    pub fn page_background(&self) -> &'static str {
        match (self.background, self.theme) {
            (Some(bg), _) => bg,
            (None, Theme::Dark) => "#0F0F10",
            (None, Theme::Light) => "#FFFFFF",
        }
    }

    pub fn text_color(&self) -> &'static str {
        match self.theme {
            Theme::Dark => "#F4F4F5",
            Theme::Light => "#1E1E1E",
        }
    }

    pub fn muted_color(&self) -> &'static str {
        match self.theme {
            Theme::Dark => "#A1A1AA",
            Theme::Light => "#646464",
        }
    }
}

pub const STANDARD_SECTIONS: &[Section] = &[
    Section::Header,
    Section::Parties,
    Section::Items,
    Section::Totals,
    Section::Notes,
    Section::Footer,
];

/// Notas antes de los totales.
pub const NOTES_FIRST_SECTIONS: &[Section] = &[
    Section::Header,
    Section::Parties,
    Section::Items,
    Section::Notes,
    Section::Totals,
    Section::Footer,
];

/// Descripción de una plantilla: secciones en orden más tokens de estilo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Layout {
    pub sections: &'static [Section],
    pub style: StyleTokens,
}

impl Layout {
    pub const fn new(sections: &'static [Section], style: StyleTokens) -> Self {
        Layout { sections, style }
    }

    pub fn has(&self, section: Section) -> bool {
        self.sections.contains(&section)
    }
}
