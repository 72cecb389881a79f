//! Single-line diagram model
//!
//! Named buses, sources and loads plus the lines connecting them. The
//! diagram is built once from static configuration and only read afterwards;
//! it carries what a renderer needs (positions, labels, attributes) and does
//! no electrical validation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Position on the drawing canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Grid node where elements connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Voltage magnitude (p.u. or kV, as configured)
    pub voltage: f64,
    /// Voltage angle in degrees
    pub angle: f64,
    pub width: f64,
    pub height: f64,
}

/// Generation source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub voltage: f64,
}

/// Consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub power: f64,
}

/// Line descriptor as configured, endpoints given by element name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSpec {
    pub name: String,
    pub from: String,
    pub to: String,
    pub impedance: f64,
    #[serde(default)]
    pub directed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Bus,
    Source,
    Load,
}

/// Borrowed view of any diagram element
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementRef<'a> {
    Bus(&'a Bus),
    Source(&'a Source),
    Load(&'a Load),
}

impl<'a> ElementRef<'a> {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementRef::Bus(_) => ElementKind::Bus,
            ElementRef::Source(_) => ElementKind::Source,
            ElementRef::Load(_) => ElementKind::Load,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            ElementRef::Bus(b) => &b.name,
            ElementRef::Source(s) => &s.name,
            ElementRef::Load(l) => &l.name,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            ElementRef::Bus(b) => Position::new(b.x, b.y),
            ElementRef::Source(s) => Position::new(s.x, s.y),
            ElementRef::Load(l) => Position::new(l.x, l.y),
        }
    }
}

/// Result of resolving an element name
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointLookup<'a> {
    Found(ElementRef<'a>),
    NotFound,
}

impl<'a> EndpointLookup<'a> {
    pub fn found(self) -> Option<ElementRef<'a>> {
        match self {
            EndpointLookup::Found(element) => Some(element),
            EndpointLookup::NotFound => None,
        }
    }
}

/// Resolved line endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEndpoint {
    pub name: String,
    pub kind: ElementKind,
}

/// Line connecting two resolved elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramLine {
    pub name: String,
    pub from: LineEndpoint,
    pub to: LineEndpoint,
    pub impedance: f64,
    pub directed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSide {
    From,
    To,
}

/// A configured line that could not be created because an endpoint name
/// matches no element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedLine {
    pub line: String,
    pub endpoint: String,
    pub side: LineSide,
}

/// Canvas the diagram is drawn on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Static diagram configuration (TOML)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramConfig {
    #[serde(default)]
    pub canvas: Canvas,
    #[serde(default)]
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub loads: Vec<Load>,
    #[serde(default)]
    pub lines: Vec<LineSpec>,
}

impl DiagramConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("invalid diagram configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read diagram config {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Small reference topology used when no configuration file is set
    pub fn builtin() -> Self {
        let bus = |name: &str, x: f64, y: f64, voltage: f64, angle: f64| Bus {
            name: name.to_string(),
            x,
            y,
            voltage,
            angle,
            width: 120.0,
            height: 10.0,
        };
        let line = |name: &str, from: &str, to: &str, impedance: f64, directed: bool| LineSpec {
            name: name.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            impedance,
            directed,
        };

        Self {
            canvas: Canvas::default(),
            buses: vec![
                bus("Bus 1", 300.0, 120.0, 1.00, 0.0),
                bus("Bus 2", 300.0, 320.0, 0.98, -2.5),
                bus("Bus 3", 560.0, 320.0, 0.97, -4.1),
            ],
            sources: vec![
                Source {
                    name: "Wind Farm".to_string(),
                    x: 100.0,
                    y: 60.0,
                    voltage: 1.02,
                },
                Source {
                    name: "Solar PV".to_string(),
                    x: 620.0,
                    y: 140.0,
                    voltage: 1.01,
                },
            ],
            loads: vec![
                Load {
                    name: "City Load".to_string(),
                    x: 300.0,
                    y: 500.0,
                    power: 85.0,
                },
                Load {
                    name: "Industrial Load".to_string(),
                    x: 640.0,
                    y: 480.0,
                    power: 40.0,
                },
            ],
            lines: vec![
                line("L1", "Wind Farm", "Bus 1", 0.05, true),
                line("L2", "Solar PV", "Bus 3", 0.04, true),
                line("L3", "Bus 1", "Bus 2", 0.08, false),
                line("L4", "Bus 2", "Bus 3", 0.06, false),
                line("L5", "Bus 2", "City Load", 0.02, true),
                line("L6", "Bus 3", "Industrial Load", 0.03, true),
            ],
        }
    }
}

/// Built diagram
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub canvas: Canvas,
    pub buses: BTreeMap<String, Bus>,
    pub sources: BTreeMap<String, Source>,
    pub loads: BTreeMap<String, Load>,
    pub lines: Vec<DiagramLine>,
}

/// Diagram plus everything that could not be placed in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramBuild {
    pub diagram: Diagram,
    pub unresolved: Vec<UnresolvedLine>,
}

impl DiagramBuild {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

impl Diagram {
    /// Build the diagram from configuration.
    ///
    /// Lines whose endpoints do not resolve are left out and reported in
    /// [`DiagramBuild::unresolved`].
    pub fn build(config: &DiagramConfig) -> DiagramBuild {
        let mut diagram = Diagram {
            canvas: config.canvas,
            ..Default::default()
        };

        for bus in &config.buses {
            if diagram.buses.insert(bus.name.clone(), bus.clone()).is_some() {
                warn!(name = %bus.name, "duplicate bus name, keeping last definition");
            }
        }
        for source in &config.sources {
            if diagram.sources.insert(source.name.clone(), source.clone()).is_some() {
                warn!(name = %source.name, "duplicate source name, keeping last definition");
            }
        }
        for load in &config.loads {
            if diagram.loads.insert(load.name.clone(), load.clone()).is_some() {
                warn!(name = %load.name, "duplicate load name, keeping last definition");
            }
        }

        let mut lines = Vec::with_capacity(config.lines.len());
        let mut unresolved = Vec::new();

        for entry in &config.lines {
            let from = diagram.lookup(&entry.from).found();
            let to = diagram.lookup(&entry.to).found();

            match (from, to) {
                (Some(from), Some(to)) => {
                    debug!(line = %entry.name, from = from.name(), to = to.name(), "connecting");
                    lines.push(DiagramLine {
                        name: entry.name.clone(),
                        from: LineEndpoint {
                            name: from.name().to_string(),
                            kind: from.kind(),
                        },
                        to: LineEndpoint {
                            name: to.name().to_string(),
                            kind: to.kind(),
                        },
                        impedance: entry.impedance,
                        directed: entry.directed,
                    });
                }
                (from, to) => {
                    if from.is_none() {
                        unresolved.push(UnresolvedLine {
                            line: entry.name.clone(),
                            endpoint: entry.from.clone(),
                            side: LineSide::From,
                        });
                    }
                    if to.is_none() {
                        unresolved.push(UnresolvedLine {
                            line: entry.name.clone(),
                            endpoint: entry.to.clone(),
                            side: LineSide::To,
                        });
                    }
                    warn!(
                        line = %entry.name,
                        from = %entry.from,
                        to = %entry.to,
                        "line skipped: endpoint not found"
                    );
                }
            }
        }

        diagram.lines = lines;
        DiagramBuild {
            diagram,
            unresolved,
        }
    }

    /// Resolve an element name. Buses shadow sources, sources shadow loads.
    pub fn lookup(&self, name: &str) -> EndpointLookup<'_> {
        if let Some(bus) = self.buses.get(name) {
            return EndpointLookup::Found(ElementRef::Bus(bus));
        }
        if let Some(source) = self.sources.get(name) {
            return EndpointLookup::Found(ElementRef::Source(source));
        }
        if let Some(load) = self.loads.get(name) {
            return EndpointLookup::Found(ElementRef::Load(load));
        }
        EndpointLookup::NotFound
    }

    /// Positions of both ends of a line, for drawing
    pub fn segment(&self, line: &DiagramLine) -> Option<(Position, Position)> {
        let from = self.lookup(&line.from.name).found()?;
        let to = self.lookup(&line.to.name).found()?;
        Some((from.position(), to.position()))
    }

    pub fn element_count(&self) -> usize {
        self.buses.len() + self.sources.len() + self.loads.len()
    }
}
