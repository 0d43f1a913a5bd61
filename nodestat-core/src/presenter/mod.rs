//! Turns a [`StatsSnapshot`] into a display row
//!
//! Cells carry an [`Emphasis`] per text span rather than terminal escape
//! codes, so the renderer decides how each emphasis looks.

use crate::stats::StatsSnapshot;

/// Usernames shown per line of the users cell
pub const USERS_PER_LINE: usize = 2;

/// Per-core percentages shown per line
pub const CORES_PER_LINE: usize = 4;

/// Column names of the short table
pub const SHORT_HEADERS: [&str; 8] = [
    "hostname",
    "users_active",
    "n_cpu",
    "mem_tot",
    "mem_avail",
    "mem_used",
    "mem_used [%]",
    "cpu_load [%]",
];

/// Extra column names of the full table
pub const FULL_EXTRA_HEADERS: [&str; 2] = ["cpu_load_per_core [%]", "ps [u, cmd, %cpu > 10%]"];

/// Display emphasis of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emphasis {
    /// Low usage
    Normal,
    /// Usage above 25%
    Warning,
    /// Usage above 50%
    Critical,
    /// Filler that should not stand out
    Hidden,
}

impl Emphasis {
    /// Emphasis for a usage percentage: above 50 is critical, above 25 is a
    /// warning, anything else is normal
    #[must_use]
    pub fn for_percent(value: f64) -> Self {
        if value > 50.0 {
            Self::Critical
        } else if value > 25.0 {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

/// A run of text with an optional emphasis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Text content
    pub text: String,
    /// Emphasis, `None` for plain text
    pub emphasis: Option<Emphasis>,
}

impl Span {
    /// Unstyled text
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasis: None,
        }
    }

    /// A percentage, emphasized by its value
    #[must_use]
    pub fn percent(value: f64) -> Self {
        Self {
            text: format_percent(value),
            emphasis: Some(Emphasis::for_percent(value)),
        }
    }

    /// Filler used to complete a short line of per-core values
    #[must_use]
    pub fn padding() -> Self {
        Self {
            text: "0.0".to_string(),
            emphasis: Some(Emphasis::Hidden),
        }
    }
}

/// One table cell: lines of spans. Spans on a line are separated by a space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    lines: Vec<Vec<Span>>,
}

impl Cell {
    /// Cell made of the given lines
    #[must_use]
    pub const fn from_lines(lines: Vec<Vec<Span>>) -> Self {
        Self { lines }
    }

    /// Single-line plain cell
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::from_lines(vec![vec![Span::plain(text)]])
    }

    /// Single-line emphasized percentage
    #[must_use]
    pub fn percent(value: f64) -> Self {
        Self::from_lines(vec![vec![Span::percent(value)]])
    }

    /// Lines of the cell
    #[must_use]
    pub fn lines(&self) -> &[Vec<Span>] {
        &self.lines
    }

    /// Text of the cell without emphasis, lines joined with `\n`
    #[must_use]
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| {
                line.iter()
                    .map(|span| span.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One host's row, one cell per header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    /// Host label
    pub host: String,
    /// Cells in header order, starting with the host label
    pub cells: Vec<Cell>,
}

/// Slot in a line of per-core values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoreSlot {
    /// Measured usage of one core
    Value(f64),
    /// Filler after the last core
    Padding,
}

impl CoreSlot {
    /// Span for this slot
    #[must_use]
    pub fn span(self) -> Span {
        match self {
            Self::Value(v) => Span::percent(v),
            Self::Padding => Span::padding(),
        }
    }
}

/// Splits `items` into lines of at most `width` entries
#[must_use]
pub fn wrap<T: Clone>(items: &[T], width: usize) -> Vec<Vec<T>> {
    items.chunks(width.max(1)).map(<[T]>::to_vec).collect()
}

/// Splits per-core values into lines of exactly [`CORES_PER_LINE`] slots,
/// padding the last line
#[must_use]
pub fn wrap_per_core(values: &[f64]) -> Vec<Vec<CoreSlot>> {
    values
        .chunks(CORES_PER_LINE)
        .map(|chunk| {
            let mut line: Vec<CoreSlot> = chunk.iter().copied().map(CoreSlot::Value).collect();
            line.resize(CORES_PER_LINE, CoreSlot::Padding);
            line
        })
        .collect()
}

/// Formats a byte count with a base-1024 unit and one decimal (`512.0M`).
/// Counts below 1024 are shown as `<n>B`.
#[must_use]
pub fn format_bytes_human(bytes: u64) -> String {
    const UNITS: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    for (i, unit) in UNITS.iter().enumerate().rev() {
        let factor = 1u64 << ((i + 1) * 10);
        if bytes >= factor {
            return format!("{:.1}{unit}", bytes as f64 / factor as f64);
        }
    }
    format!("{bytes}B")
}

/// Formats a percentage in its shortest form that keeps a fractional part
/// (`60.0`, `12.3`)
#[must_use]
pub fn format_percent(value: f64) -> String {
    format!("{value:?}")
}

/// Stateless builder of display rows and headers
pub struct StatsPresenter;

impl StatsPresenter {
    /// Column names for the chosen mode, in cell order
    #[must_use]
    pub fn headers(short: bool) -> Vec<&'static str> {
        let mut headers = SHORT_HEADERS.to_vec();
        if !short {
            headers.extend(FULL_EXTRA_HEADERS);
        }
        headers
    }

    /// Builds the row for `host`. Short rows have 8 cells, full rows 10.
    #[must_use]
    pub fn build_row(host: &str, snapshot: &StatsSnapshot, short: bool) -> DisplayRow {
        let memory = &snapshot.memory;

        let users = wrap(&snapshot.usernames, USERS_PER_LINE)
            .into_iter()
            .map(|line| line.into_iter().map(Span::plain).collect())
            .collect();

        let mut cells = vec![
            Cell::plain(host),
            Cell::from_lines(users),
            Cell::plain(snapshot.cpu_logical.to_string()),
            Cell::plain(format_bytes_human(memory.total)),
            Cell::plain(format_bytes_human(memory.available)),
            Cell::plain(format_bytes_human(memory.used)),
            Cell::percent(memory.percent),
            Cell::percent(snapshot.cpu_percent),
        ];

        if !short {
            let per_core = wrap_per_core(&snapshot.cpu_percent_per_core)
                .into_iter()
                .map(|line| line.into_iter().map(CoreSlot::span).collect())
                .collect();

            let processes = snapshot
                .heavy_processes
                .iter()
                .map(|p| {
                    vec![
                        Span::plain(p.user.as_str()),
                        Span::plain(p.command.as_str()),
                        Span::percent(p.cpu_percent),
                    ]
                })
                .collect();

            cells.push(Cell::from_lines(per_core));
            cells.push(Cell::from_lines(processes));
        }

        DisplayRow {
            host: host.to_string(),
            cells,
        }
    }
}
