// Interaction controller + terminal rendering. Widget state lives in `App`
// as closed enumerations; every interaction recomputes its view from the two
// immutable base tables (filter -> aggregate -> chart spec -> widget).

use crate::aggregate::{self, AreaFilter, BuilderScope, Source};
use crate::chart::{self, ChartSpec, TableView};
use crate::filter::{self, FilterCriteria, MAX_YEAR, MIN_YEAR};
use crate::loader::{FinancedRecord, UnionRecord};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Dataset, GraphType,
        Paragraph, Row, Table, TableState,
    },
    Frame, Terminal,
};
use std::io;

const NO_DATA_NOTICE: &str = "Nenhum dado encontrado para os filtros selecionados.";

/// Top-N selector values (slider steps of the original dashboard).
const TOP_N_STEPS: [usize; 5] = [10, 20, 30, 40, 50];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Municipios,
    Construtoras,
    Anos,
    Mandatos,
    Modalidades,
    Tabelas,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Municipios => Page::Construtoras,
            Page::Construtoras => Page::Anos,
            Page::Anos => Page::Mandatos,
            Page::Mandatos => Page::Modalidades,
            Page::Modalidades => Page::Tabelas,
            Page::Tabelas => Page::Municipios,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Municipios => Page::Tabelas,
            Page::Construtoras => Page::Municipios,
            Page::Anos => Page::Construtoras,
            Page::Mandatos => Page::Anos,
            Page::Modalidades => Page::Mandatos,
            Page::Tabelas => Page::Modalidades,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Municipios => "Municípios",
            Page::Construtoras => "Construtoras",
            Page::Anos => "Anos",
            Page::Mandatos => "Mandatos",
            Page::Modalidades => "Modalidades",
            Page::Tabelas => "Tabelas",
        }
    }

    pub fn all() -> [Page; 6] {
        [
            Page::Municipios,
            Page::Construtoras,
            Page::Anos,
            Page::Mandatos,
            Page::Modalidades,
            Page::Tabelas,
        ]
    }
}

/// Geographic dimension selector for the municipalities chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Estado,
    Regiao,
}

impl Dimension {
    pub fn name(&self) -> &str {
        match self {
            Dimension::Estado => "Estado",
            Dimension::Regiao => "Região",
        }
    }
}

/// Which of the table page's four filters has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableFocus {
    Municipio,
    Estado,
    Regiao,
    Ano,
}

impl TableFocus {
    fn next(&self) -> Self {
        match self {
            TableFocus::Municipio => TableFocus::Estado,
            TableFocus::Estado => TableFocus::Regiao,
            TableFocus::Regiao => TableFocus::Ano,
            TableFocus::Ano => TableFocus::Municipio,
        }
    }
}

/// Filter toggles + selections for the table page. Values are indices into
/// distinct-value lists, so only real column values are selectable.
#[derive(Debug, Clone)]
struct TableFilters {
    municipio_on: bool,
    municipio_idx: usize,
    estado_on: bool,
    estado_idx: usize,
    regiao_on: bool,
    regiao_idx: usize,
    ano_on: bool,
    ano: i32,
}

impl TableFilters {
    fn new() -> Self {
        TableFilters {
            municipio_on: false,
            municipio_idx: 0,
            estado_on: false,
            estado_idx: 0,
            regiao_on: false,
            regiao_idx: 0,
            ano_on: false,
            ano: MIN_YEAR,
        }
    }
}

pub struct App {
    pub union: Vec<UnionRecord>,
    pub financed: Vec<FinancedRecord>,
    pub current_page: Page,

    // Municípios
    muni_source: Source,
    muni_dimension: Dimension,
    muni_value_idx: usize,
    muni_top_idx: usize,

    // Construtoras
    builder_scope: BuilderScope,
    builder_top_idx: usize,

    // Anos / Mandatos (shared selector, like the original sidebar)
    years_source: Source,

    // Modalidades
    modality_year: i32,
    modality_region_idx: usize, // 0 = Todas
    modality_state_idx: usize,  // 0 = Todos

    // Tabelas
    table_union: bool,
    table_filters: TableFilters,
    table_focus: TableFocus,
    removed_columns: Vec<String>,
    column_cursor: usize,
    table_rows_shown: usize,
    table_state: TableState,
    status_message: Option<String>,
}

impl App {
    pub fn new(union: Vec<UnionRecord>, financed: Vec<FinancedRecord>) -> Self {
        App {
            union,
            financed,
            current_page: Page::Municipios,
            muni_source: Source::Union,
            muni_dimension: Dimension::Estado,
            muni_value_idx: 0,
            muni_top_idx: 0,
            builder_scope: BuilderScope::Municipalities,
            builder_top_idx: 0,
            years_source: Source::Union,
            modality_year: 2014,
            modality_region_idx: 0,
            modality_state_idx: 0,
            table_union: true,
            table_filters: TableFilters::new(),
            table_focus: TableFocus::Municipio,
            removed_columns: Vec::new(),
            column_cursor: 0,
            table_rows_shown: 10,
            table_state: TableState::default(),
            status_message: None,
        }
    }

    // ------------------------------------------------------------------
    // Municípios selectors
    // ------------------------------------------------------------------

    pub fn cycle_muni_source(&mut self) {
        let all = Source::all();
        let i = all.iter().position(|s| *s == self.muni_source).unwrap_or(0);
        self.muni_source = all[(i + 1) % all.len()];
        // The financed table has no region column; force the state dimension
        if !self.muni_source.has_region() {
            self.muni_dimension = Dimension::Estado;
        }
        self.muni_value_idx = 0;
    }

    pub fn cycle_muni_dimension(&mut self) {
        if !self.muni_source.has_region() {
            return;
        }
        self.muni_dimension = match self.muni_dimension {
            Dimension::Estado => Dimension::Regiao,
            Dimension::Regiao => Dimension::Estado,
        };
        self.muni_value_idx = 0;
    }

    /// Selector options for the active source + dimension.
    fn muni_options(&self) -> Vec<String> {
        match self.muni_dimension {
            Dimension::Estado => match self.muni_source {
                Source::Financed => filter::distinct_states(&self.financed),
                _ => filter::distinct_states(&self.union),
            },
            Dimension::Regiao => filter::distinct_regions(&self.union),
        }
    }

    pub fn step_muni_value(&mut self, delta: i64) {
        let len = self.muni_options().len();
        if len > 0 {
            self.muni_value_idx = step_index(self.muni_value_idx, len, delta);
        }
    }

    fn muni_area(&self) -> Option<AreaFilter> {
        let options = self.muni_options();
        let value = options.get(self.muni_value_idx)?.clone();
        Some(match self.muni_dimension {
            Dimension::Estado => AreaFilter::State(value),
            Dimension::Regiao => AreaFilter::Region(value),
        })
    }

    pub fn muni_top_n(&self) -> usize {
        TOP_N_STEPS[self.muni_top_idx]
    }

    pub fn cycle_muni_top_n(&mut self) {
        self.muni_top_idx = (self.muni_top_idx + 1) % TOP_N_STEPS.len();
    }

    // ------------------------------------------------------------------
    // Construtoras selectors
    // ------------------------------------------------------------------

    pub fn cycle_builder_scope(&mut self) {
        let all = BuilderScope::all();
        let i = all.iter().position(|s| *s == self.builder_scope).unwrap_or(0);
        self.builder_scope = all[(i + 1) % all.len()];
    }

    pub fn builder_top_n(&self) -> usize {
        TOP_N_STEPS[self.builder_top_idx]
    }

    pub fn cycle_builder_top_n(&mut self) {
        self.builder_top_idx = (self.builder_top_idx + 1) % TOP_N_STEPS.len();
    }

    // ------------------------------------------------------------------
    // Anos / Mandatos selectors
    // ------------------------------------------------------------------

    pub fn cycle_years_source(&mut self) {
        let all = Source::all();
        let i = all.iter().position(|s| *s == self.years_source).unwrap_or(0);
        self.years_source = all[(i + 1) % all.len()];
    }

    // ------------------------------------------------------------------
    // Modalidades selectors
    // ------------------------------------------------------------------

    pub fn step_modality_year(&mut self, delta: i32) {
        self.modality_year = (self.modality_year + delta).clamp(MIN_YEAR, MAX_YEAR);
    }

    pub fn cycle_modality_region(&mut self) {
        let len = filter::distinct_regions(&self.union).len() + 1; // "Todas"
        self.modality_region_idx = (self.modality_region_idx + 1) % len;
    }

    pub fn cycle_modality_state(&mut self) {
        let len = filter::distinct_states(&self.union).len() + 1; // "Todos"
        self.modality_state_idx = (self.modality_state_idx + 1) % len;
    }

    fn modality_criteria(&self) -> FilterCriteria {
        let mut criteria = FilterCriteria::new().with_year(self.modality_year);
        if self.modality_region_idx > 0 {
            let regions = filter::distinct_regions(&self.union);
            if let Some(region) = regions.get(self.modality_region_idx - 1) {
                criteria = criteria.with_region(region.clone());
            }
        }
        if self.modality_state_idx > 0 {
            let states = filter::distinct_states(&self.union);
            if let Some(state) = states.get(self.modality_state_idx - 1) {
                criteria = criteria.with_state(state.clone());
            }
        }
        criteria
    }

    fn modality_region_label(&self) -> String {
        if self.modality_region_idx == 0 {
            "Todas".to_string()
        } else {
            filter::distinct_regions(&self.union)
                .get(self.modality_region_idx - 1)
                .cloned()
                .unwrap_or_else(|| "Todas".to_string())
        }
    }

    fn modality_state_label(&self) -> String {
        if self.modality_state_idx == 0 {
            "Todos".to_string()
        } else {
            filter::distinct_states(&self.union)
                .get(self.modality_state_idx - 1)
                .cloned()
                .unwrap_or_else(|| "Todos".to_string())
        }
    }

    // ------------------------------------------------------------------
    // Tabelas: source, filters, columns, export
    // ------------------------------------------------------------------

    pub fn table_source(&self) -> Source {
        if self.table_union {
            Source::Union
        } else {
            Source::Financed
        }
    }

    pub fn toggle_table_source(&mut self) {
        self.table_union = !self.table_union;
        // Region is only a union column; drop the filter when leaving union
        if !self.table_union {
            self.table_filters.regiao_on = false;
            if self.table_focus == TableFocus::Regiao {
                self.table_focus = TableFocus::Estado;
            }
        }
        self.table_filters.municipio_idx = 0;
        self.table_filters.estado_idx = 0;
        self.removed_columns.clear();
        self.column_cursor = 0;
        self.table_state.select(None);
        self.status_message = None;
    }

    fn toggle_table_filter(&mut self, focus: TableFocus) {
        match focus {
            TableFocus::Municipio => {
                self.table_filters.municipio_on = !self.table_filters.municipio_on
            }
            TableFocus::Estado => self.table_filters.estado_on = !self.table_filters.estado_on,
            TableFocus::Regiao => {
                if self.table_union {
                    self.table_filters.regiao_on = !self.table_filters.regiao_on;
                }
            }
            TableFocus::Ano => self.table_filters.ano_on = !self.table_filters.ano_on,
        }
        self.table_focus = focus;
    }

    fn step_focused_filter(&mut self, delta: i64) {
        match self.table_focus {
            TableFocus::Municipio => {
                let len = self.table_distinct_municipalities().len();
                if len > 0 {
                    self.table_filters.municipio_idx =
                        step_index(self.table_filters.municipio_idx, len, delta);
                }
            }
            TableFocus::Estado => {
                let len = self.table_distinct_states().len();
                if len > 0 {
                    self.table_filters.estado_idx =
                        step_index(self.table_filters.estado_idx, len, delta);
                }
            }
            TableFocus::Regiao => {
                let len = filter::distinct_regions(&self.union).len();
                if len > 0 {
                    self.table_filters.regiao_idx =
                        step_index(self.table_filters.regiao_idx, len, delta);
                }
            }
            TableFocus::Ano => {
                self.table_filters.ano =
                    (self.table_filters.ano + delta as i32).clamp(MIN_YEAR, MAX_YEAR);
            }
        }
    }

    fn table_distinct_municipalities(&self) -> Vec<String> {
        if self.table_union {
            filter::distinct_municipalities(&self.union)
        } else {
            filter::distinct_municipalities(&self.financed)
        }
    }

    fn table_distinct_states(&self) -> Vec<String> {
        if self.table_union {
            filter::distinct_states(&self.union)
        } else {
            filter::distinct_states(&self.financed)
        }
    }

    /// Criteria assembled from the enabled table-page filters. The year
    /// filter also applies the bounded 2009-2024 window, as the original
    /// table view did.
    fn table_criteria(&self) -> FilterCriteria {
        let mut criteria = FilterCriteria::new();
        if self.table_filters.municipio_on {
            if let Some(m) = self
                .table_distinct_municipalities()
                .get(self.table_filters.municipio_idx)
            {
                criteria = criteria.with_municipality(m.clone());
            }
        }
        if self.table_filters.estado_on {
            if let Some(uf) = self.table_distinct_states().get(self.table_filters.estado_idx) {
                criteria = criteria.with_state(uf.clone());
            }
        }
        if self.table_filters.regiao_on && self.table_union {
            if let Some(r) = filter::distinct_regions(&self.union).get(self.table_filters.regiao_idx)
            {
                criteria = criteria.with_region(r.clone());
            }
        }
        if self.table_filters.ano_on {
            criteria = criteria.with_year(self.table_filters.ano).with_bound_years();
        }
        criteria
    }

    /// Full filtered + projected view for the table page (no row limit).
    pub fn table_view(&self) -> TableView {
        let criteria = self.table_criteria();
        let view = if self.table_union {
            TableView::from_union(&filter::apply(&self.union, &criteria))
        } else {
            TableView::from_financed(&filter::apply(&self.financed, &criteria))
        };
        view.drop_columns(&self.removed_columns)
    }

    fn all_table_columns(&self) -> Vec<String> {
        let view = if self.table_union {
            TableView::from_union(&[])
        } else {
            TableView::from_financed(&[])
        };
        view.columns
    }

    fn toggle_column_removal(&mut self) {
        let columns = self.all_table_columns();
        if let Some(name) = columns.get(self.column_cursor) {
            if let Some(i) = self.removed_columns.iter().position(|c| c == name) {
                self.removed_columns.remove(i);
            } else {
                self.removed_columns.push(name.clone());
            }
        }
    }

    fn step_column_cursor(&mut self, delta: i64) {
        let len = self.all_table_columns().len();
        if len > 0 {
            self.column_cursor = step_index(self.column_cursor, len, delta);
        }
    }

    fn adjust_rows_shown(&mut self, delta: i64) {
        let total = self.table_view().row_count().max(1);
        let next = self.table_rows_shown as i64 + delta;
        self.table_rows_shown = next.clamp(1, total as i64) as usize;
    }

    fn export_table(&mut self) {
        let view = self.table_view();
        match view.write_csv(std::path::Path::new("."), self.table_source()) {
            Ok(path) => {
                self.status_message = Some(format!("Tabela salva em {}", path.display()));
            }
            Err(err) => {
                self.status_message = Some(format!("Falha ao salvar: {:#}", err));
            }
        }
    }

    fn scroll_table(&mut self, delta: i64) {
        let shown = self.table_view().head(self.table_rows_shown).row_count();
        if shown == 0 {
            self.table_state.select(None);
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) => step_index(i, shown, delta),
            None => 0,
        };
        self.table_state.select(Some(i));
    }
}

/// Wrap-around index stepping for cyclic selectors.
fn step_index(current: usize, len: usize, delta: i64) -> usize {
    let len = len as i64;
    ((current as i64 + delta).rem_euclid(len)) as usize
}

// ============================================================================
// EVENT LOOP
// ============================================================================

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.current_page = app.current_page.previous();
                    } else {
                        app.current_page = app.current_page.next();
                    }
                }
                KeyCode::BackTab => app.current_page = app.current_page.previous(),
                code => handle_page_key(app, code),
            }
        }
    }
}

fn handle_page_key(app: &mut App, code: KeyCode) {
    match app.current_page {
        Page::Municipios => match code {
            KeyCode::Char('b') => app.cycle_muni_source(),
            KeyCode::Char('d') => app.cycle_muni_dimension(),
            KeyCode::Char('n') => app.cycle_muni_top_n(),
            KeyCode::Left | KeyCode::Char('h') => app.step_muni_value(-1),
            KeyCode::Right | KeyCode::Char('l') => app.step_muni_value(1),
            _ => {}
        },
        Page::Construtoras => match code {
            KeyCode::Char('d') => app.cycle_builder_scope(),
            KeyCode::Char('n') => app.cycle_builder_top_n(),
            _ => {}
        },
        Page::Anos | Page::Mandatos => {
            if code == KeyCode::Char('b') {
                app.cycle_years_source();
            }
        }
        Page::Modalidades => match code {
            KeyCode::Left | KeyCode::Char('h') => app.step_modality_year(-1),
            KeyCode::Right | KeyCode::Char('l') => app.step_modality_year(1),
            KeyCode::Char('r') => app.cycle_modality_region(),
            KeyCode::Char('e') => app.cycle_modality_state(),
            _ => {}
        },
        Page::Tabelas => match code {
            KeyCode::Char('b') => app.toggle_table_source(),
            KeyCode::Char('1') => app.toggle_table_filter(TableFocus::Municipio),
            KeyCode::Char('2') => app.toggle_table_filter(TableFocus::Estado),
            KeyCode::Char('3') => app.toggle_table_filter(TableFocus::Regiao),
            KeyCode::Char('4') => app.toggle_table_filter(TableFocus::Ano),
            KeyCode::Char('f') => app.table_focus = app.table_focus.next(),
            KeyCode::Left | KeyCode::Char('h') => app.step_focused_filter(-1),
            KeyCode::Right | KeyCode::Char('l') => app.step_focused_filter(1),
            KeyCode::Char('j') => app.step_column_cursor(1),
            KeyCode::Char('k') => app.step_column_cursor(-1),
            KeyCode::Char(' ') => app.toggle_column_removal(),
            KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_rows_shown(10),
            KeyCode::Char('-') => app.adjust_rows_shown(-10),
            KeyCode::Down => app.scroll_table(1),
            KeyCode::Up => app.scroll_table(-1),
            KeyCode::Char('s') => app.export_table(),
            _ => {}
        },
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Municipios => render_municipios(f, chunks[1], app),
        Page::Construtoras => render_construtoras(f, chunks[1], app),
        Page::Anos => render_anos(f, chunks[1], app),
        Page::Mandatos => render_mandatos(f, chunks[1], app),
        Page::Modalidades => render_modalidades(f, chunks[1], app),
        Page::Tabelas => render_tabelas(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    let pages = Page::all();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("União: {}", app.union.len()),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Financiado: {}", app.financed.len()),
        Style::default().fg(Color::Cyan),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Minha Casa Minha Vida - Análise de Dados "),
    );

    f.render_widget(header, area);
}

fn render_no_data(f: &mut Frame, area: Rect, title: &str) {
    let notice = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", NO_DATA_NOTICE),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(format!(" {} ", title)),
    );
    f.render_widget(notice, area);
}

fn render_bar_spec(f: &mut Frame, area: Rect, spec: &ChartSpec, label_width: usize) {
    let bars = match spec {
        ChartSpec::Bar { bars, .. } => bars,
        _ => return,
    };

    let bar_data: Vec<Bar> = bars
        .iter()
        .map(|(label, value)| {
            Bar::default()
                .label(Line::from(truncate(label, label_width)))
                .value(value.round() as u64)
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} ", spec.title())),
        )
        .data(BarGroup::default().bars(&bar_data))
        .bar_width(label_width as u16)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Green))
        .value_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(chart, area);
}

fn render_municipios(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let selector_line = Line::from(vec![
        Span::styled("Base: ", Style::default().fg(Color::Cyan)),
        Span::styled(app.muni_source.name(), Style::default().fg(Color::Yellow)),
        Span::raw("  |  Filtro: "),
        Span::styled(app.muni_dimension.name(), Style::default().fg(Color::Yellow)),
        Span::raw("  |  Valor: "),
        Span::styled(
            app.muni_area()
                .map(|a| a.value().to_string())
                .unwrap_or_else(|| "—".to_string()),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  Top: "),
        Span::styled(
            app.muni_top_n().to_string(),
            Style::default().fg(Color::Yellow),
        ),
    ]);
    let selectors = Paragraph::new(vec![selector_line])
        .block(Block::default().borders(Borders::ALL).title(" Seleção "));
    f.render_widget(selectors, chunks[0]);

    let area_filter = match app.muni_area() {
        Some(a) => a,
        None => {
            render_no_data(f, chunks[1], "Municípios");
            return;
        }
    };

    let summary = aggregate::top_municipalities(
        &app.union,
        &app.financed,
        app.muni_source,
        &area_filter,
        app.muni_top_n(),
    );
    let spec = chart::bar_chart(
        format!(
            "Municípios com maiores quantidades de unidades habitacionais - {}",
            area_filter.value()
        ),
        &summary,
    );

    if spec.is_empty() {
        render_no_data(f, chunks[1], "Municípios");
    } else {
        render_bar_spec(f, chunks[1], &spec, 10);
    }
}

fn render_construtoras(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let selector_line = Line::from(vec![
        Span::styled("Filtrar por: ", Style::default().fg(Color::Cyan)),
        Span::styled(app.builder_scope.name(), Style::default().fg(Color::Yellow)),
        Span::raw("  |  Top: "),
        Span::styled(
            app.builder_top_n().to_string(),
            Style::default().fg(Color::Yellow),
        ),
    ]);
    let selectors = Paragraph::new(vec![selector_line])
        .block(Block::default().borders(Borders::ALL).title(" Seleção "));
    f.render_widget(selectors, chunks[0]);

    let summary = aggregate::top_builders(&app.union, app.builder_scope, app.builder_top_n());
    let spec = chart::bar_chart(
        format!(
            "Construtoras com maior atuação em {} - Brasil",
            app.builder_scope.name().to_lowercase()
        ),
        &summary,
    );

    if spec.is_empty() {
        render_no_data(f, chunks[1], "Construtoras");
    } else {
        render_bar_spec(f, chunks[1], &spec, 12);
    }
}

fn render_anos(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let selectors = Paragraph::new(vec![Line::from(vec![
        Span::styled("Base: ", Style::default().fg(Color::Cyan)),
        Span::styled(app.years_source.name(), Style::default().fg(Color::Yellow)),
    ])])
    .block(Block::default().borders(Borders::ALL).title(" Seleção "));
    f.render_widget(selectors, chunks[0]);

    let summary = aggregate::units_by_year(&app.union, &app.financed, app.years_source);
    let spec = chart::line_chart(
        "Progressão de Unidades Habitacionais por Ano (2009-2024)",
        &summary,
    );

    let points = match &spec {
        ChartSpec::Line { points, .. } if !points.is_empty() => points,
        _ => {
            render_no_data(f, chunks[1], "Anos");
            return;
        }
    };

    let data: Vec<(f64, f64)> = points.iter().map(|(y, v)| (f64::from(*y), *v)).collect();
    let x_min = f64::from(points[0].0);
    let x_max = f64::from(points[points.len() - 1].0);
    let y_max = data.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max).max(1.0);

    let dataset = Dataset::default()
        .name("unidades (dezenas de milhar)")
        .marker(symbols::Marker::Dot)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(&data);

    let x_labels: Vec<Span> = points
        .iter()
        .step_by((points.len() / 6).max(1))
        .map(|(y, _)| Span::raw(y.to_string()))
        .collect();

    let chart_widget = Chart::new(vec![dataset])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} ", spec.title())),
        )
        .x_axis(
            Axis::default()
                .title("Ano")
                .style(Style::default().fg(Color::Gray))
                .bounds([x_min, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("UH (dezenas de milhar)")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, y_max * 1.1])
                .labels(vec![
                    Span::raw("0"),
                    Span::raw(format!("{:.0}", y_max / 2.0)),
                    Span::raw(format!("{:.0}", y_max)),
                ]),
        );

    f.render_widget(chart_widget, chunks[1]);
}

fn render_mandatos(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let selectors = Paragraph::new(vec![Line::from(vec![
        Span::styled("Base: ", Style::default().fg(Color::Cyan)),
        Span::styled(app.years_source.name(), Style::default().fg(Color::Yellow)),
    ])])
    .block(Block::default().borders(Borders::ALL).title(" Seleção "));
    f.render_widget(selectors, chunks[0]);

    let summary = aggregate::units_by_term(&app.union, &app.financed, app.years_source);
    let spec = chart::bar_chart_scaled(
        "Unidades Habitacionais Criadas por Mandato Presidencial (dezenas de milhar)",
        &summary,
    );

    if summary.iter().all(|t| t.count == 0) {
        render_no_data(f, chunks[1], "Mandatos");
    } else {
        render_bar_spec(f, chunks[1], &spec, 10);
    }
}

fn render_modalidades(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let selector_line = Line::from(vec![
        Span::styled("Ano: ", Style::default().fg(Color::Cyan)),
        Span::styled(
            app.modality_year.to_string(),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw("  |  Região: "),
        Span::styled(app.modality_region_label(), Style::default().fg(Color::Yellow)),
        Span::raw("  |  Estado: "),
        Span::styled(app.modality_state_label(), Style::default().fg(Color::Yellow)),
    ]);
    let selectors = Paragraph::new(vec![selector_line])
        .block(Block::default().borders(Borders::ALL).title(" Seleção "));
    f.render_widget(selectors, chunks[0]);

    let summary = aggregate::modality_counts(&app.union, &app.modality_criteria());
    let spec = chart::pie_chart("Distribuição de Modalidades de Empreendimentos", &summary);

    let slices = match &spec {
        ChartSpec::Pie { slices, .. } if !slices.is_empty() => slices,
        _ => {
            render_no_data(f, chunks[1], "Modalidades");
            return;
        }
    };

    // Pie rendered as a proportional breakdown: one row per slice with a
    // bar sized by percentage
    let max_bar = 40usize;
    let rows: Vec<Row> = slices
        .iter()
        .map(|s| {
            let filled = ((s.pct / 100.0) * max_bar as f64).round() as usize;
            Row::new(vec![
                Cell::from(truncate(&s.label, 36)),
                Cell::from(s.count.to_string()),
                Cell::from(format!("{:5.1}%", s.pct)),
                Cell::from("█".repeat(filled.max(1))).style(Style::default().fg(Color::Green)),
            ])
        })
        .collect();

    let header = Row::new(["Modalidade", "Qtd", "%", ""].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    }))
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let table = Table::new(
        rows,
        [
            Constraint::Length(38),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(42),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" {} ", spec.title())),
    );

    f.render_widget(table, chunks[1]);
}

fn render_tabelas(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    render_table_filters(f, chunks[0], app);

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(34)])
        .split(chunks[1]);

    render_table_rows(f, content[0], app);
    render_column_selector(f, content[1], app);
}

fn render_table_filters(f: &mut Frame, area: Rect, app: &App) {
    let filters = &app.table_filters;

    let filter_span = |label: &str, on: bool, focused: bool, value: String| -> Vec<Span> {
        let mut style = if on {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        if focused {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        vec![
            Span::styled(format!("[{}] {}", if on { "x" } else { " " }, label), style),
            Span::styled(
                if on { format!("={}", value) } else { String::new() },
                style,
            ),
            Span::raw("   "),
        ]
    };

    let municipio_value = app
        .table_distinct_municipalities()
        .get(filters.municipio_idx)
        .cloned()
        .unwrap_or_default();
    let estado_value = app
        .table_distinct_states()
        .get(filters.estado_idx)
        .cloned()
        .unwrap_or_default();
    let regiao_value = filter::distinct_regions(&app.union)
        .get(filters.regiao_idx)
        .cloned()
        .unwrap_or_default();

    let table_source = app.table_source();
    let mut spans = vec![
        Span::styled("Base: ", Style::default().fg(Color::Cyan)),
        Span::styled(
            table_source.name(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
    ];
    spans.extend(filter_span(
        "1·Município",
        filters.municipio_on,
        app.table_focus == TableFocus::Municipio,
        municipio_value,
    ));
    spans.extend(filter_span(
        "2·Estado",
        filters.estado_on,
        app.table_focus == TableFocus::Estado,
        estado_value,
    ));
    if app.table_union {
        spans.extend(filter_span(
            "3·Região",
            filters.regiao_on,
            app.table_focus == TableFocus::Regiao,
            regiao_value,
        ));
    }
    spans.extend(filter_span(
        "4·Ano",
        filters.ano_on,
        app.table_focus == TableFocus::Ano,
        filters.ano.to_string(),
    ));

    let mut lines = vec![Line::from(spans)];
    if let Some(ref message) = app.status_message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Green),
        )));
    }

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Filtros (1-4 ligar, f foco, ←/→ valor) "),
    );
    f.render_widget(panel, area);
}

fn render_table_rows(f: &mut Frame, area: Rect, app: &mut App) {
    let view = app.table_view();
    let total = view.row_count();
    let shown = view.head(app.table_rows_shown);

    if total == 0 {
        render_no_data(f, area, "Tabelas");
        return;
    }

    let header = Row::new(shown.columns.iter().map(|c| {
        Cell::from(c.as_str()).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    }))
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let col_count = shown.columns.len().max(1);
    let rows: Vec<Row> = shown
        .rows
        .iter()
        .map(|r| Row::new(r.iter().map(|v| Cell::from(truncate(v, 24)))).height(1))
        .collect();

    let widths: Vec<Constraint> = shown
        .columns
        .iter()
        .map(|_| Constraint::Ratio(1, col_count as u32))
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(
                    " {} — {} de {} linhas ",
                    app.table_source().name(),
                    shown.row_count(),
                    total
                )),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_column_selector(f: &mut Frame, area: Rect, app: &App) {
    let columns = app.all_table_columns();

    let lines: Vec<Line> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let removed = app.removed_columns.contains(name);
            let marker = if removed { "[x]" } else { "[ ]" };
            let mut style = if removed {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::White)
            };
            if i == app.column_cursor {
                style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
            }
            Line::from(Span::styled(format!(" {} {}", marker, name), style))
        })
        .collect();

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Remover colunas (j/k, espaço) "),
    );
    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let hints: &[(&str, &str)] = match app.current_page {
        Page::Municipios => &[
            ("b", "Base"),
            ("d", "Filtro"),
            ("←/→", "Valor"),
            ("n", "Top-N"),
            ("Tab", "Página"),
            ("q", "Sair"),
        ],
        Page::Construtoras => &[
            ("d", "Filtro"),
            ("n", "Top-N"),
            ("Tab", "Página"),
            ("q", "Sair"),
        ],
        Page::Anos | Page::Mandatos => &[("b", "Base"), ("Tab", "Página"), ("q", "Sair")],
        Page::Modalidades => &[
            ("←/→", "Ano"),
            ("r", "Região"),
            ("e", "Estado"),
            ("Tab", "Página"),
            ("q", "Sair"),
        ],
        Page::Tabelas => &[
            ("b", "Base"),
            ("1-4", "Filtros"),
            ("f", "Foco"),
            ("←/→", "Valor"),
            ("j/k/espaço", "Colunas"),
            ("+/-", "Linhas"),
            ("↑/↓", "Navegar"),
            ("s", "Salvar CSV"),
            ("q", "Sair"),
        ],
    };

    let mut spans = Vec::new();
    for (i, (key, label)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" | "));
        }
        spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(format!(" {}", label)));
    }

    let status_bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn union_row(year: Option<i32>, state: &str, region: &str, municipality: &str) -> UnionRecord {
        UnionRecord {
            signing_date: String::new(),
            signing_year: year,
            contracted_value: 0.0,
            disbursed_value: 0.0,
            state: state.to_string(),
            region: region.to_string(),
            municipality: municipality.to_string(),
            units: 10,
            modality: "FAR".to_string(),
            builder: "Alfa".to_string(),
        }
    }

    fn app() -> App {
        let union = vec![
            union_row(Some(2014), "SP", "Sudeste", "Campinas"),
            union_row(Some(2020), "BA", "Nordeste", "Salvador"),
        ];
        let financed = vec![FinancedRecord {
            financing_year: 2015,
            state: "SP".to_string(),
            municipality: "Santos".to_string(),
            units: 30,
        }];
        App::new(union, financed)
    }

    #[test]
    fn test_financed_source_forces_state_dimension() {
        let mut app = app();
        app.muni_dimension = Dimension::Regiao;
        // Union -> Financed
        app.cycle_muni_source();
        assert_eq!(app.muni_source, Source::Financed);
        assert_eq!(app.muni_dimension, Dimension::Estado);
        // Dimension cycling is inert while the source lacks a region column
        app.cycle_muni_dimension();
        assert_eq!(app.muni_dimension, Dimension::Estado);
    }

    #[test]
    fn test_top_n_cycles_through_fixed_steps() {
        let mut app = app();
        assert_eq!(app.muni_top_n(), 10);
        for _ in 0..4 {
            app.cycle_muni_top_n();
        }
        assert_eq!(app.muni_top_n(), 50);
        app.cycle_muni_top_n();
        assert_eq!(app.muni_top_n(), 10);
    }

    #[test]
    fn test_modality_year_clamped_to_window() {
        let mut app = app();
        app.modality_year = MIN_YEAR;
        app.step_modality_year(-1);
        assert_eq!(app.modality_year, MIN_YEAR);
        app.modality_year = MAX_YEAR;
        app.step_modality_year(1);
        assert_eq!(app.modality_year, MAX_YEAR);
    }

    #[test]
    fn test_table_source_toggle_drops_region_filter() {
        let mut app = app();
        app.table_filters.regiao_on = true;
        app.table_focus = TableFocus::Regiao;
        app.toggle_table_source();
        assert_eq!(app.table_source(), Source::Financed);
        assert!(!app.table_filters.regiao_on);
        assert_ne!(app.table_focus, TableFocus::Regiao);
        // Toggling region while on the financed table is a no-op
        app.toggle_table_filter(TableFocus::Regiao);
        assert!(!app.table_filters.regiao_on);
    }

    #[test]
    fn test_table_view_respects_filters_and_projection() {
        let mut app = app();
        app.table_filters.estado_on = true;
        app.table_filters.estado_idx = app
            .table_distinct_states()
            .iter()
            .position(|s| s == "SP")
            .unwrap();
        app.removed_columns.push("txt_regiao".to_string());

        let view = app.table_view();
        assert_eq!(view.row_count(), 1);
        assert!(!view.columns.contains(&"txt_regiao".to_string()));
    }

    #[test]
    fn test_table_year_filter_out_of_data_yields_empty() {
        let mut app = app();
        app.table_filters.ano_on = true;
        app.table_filters.ano = 2024;
        assert_eq!(app.table_view().row_count(), 0);
    }

    #[test]
    fn test_step_index_wraps() {
        assert_eq!(step_index(0, 3, -1), 2);
        assert_eq!(step_index(2, 3, 1), 0);
        assert_eq!(step_index(1, 3, 1), 2);
    }
}
