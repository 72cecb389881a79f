use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    api::response::ApiResponse,
    controller::AppState,
    domain::{Bus, Canvas, DiagramLine, Load, Position, Source, UnresolvedLine},
};

/// Line with both end positions resolved for drawing
#[derive(Debug, Serialize)]
pub struct LineView {
    #[serde(flatten)]
    pub line: DiagramLine,
    pub from_position: Position,
    pub to_position: Position,
}

#[derive(Debug, Serialize)]
pub struct DiagramView {
    pub canvas: Canvas,
    pub buses: Vec<Bus>,
    pub sources: Vec<Source>,
    pub loads: Vec<Load>,
    pub lines: Vec<LineView>,
    pub unresolved: Vec<UnresolvedLine>,
}

/// GET /api/v1/diagram
pub async fn get_diagram(State(state): State<AppState>) -> Json<ApiResponse<DiagramView>> {
    let diagram = &state.diagram.diagram;
    let lines = diagram
        .lines
        .iter()
        .filter_map(|line| {
            let (from_position, to_position) = diagram.segment(line)?;
            Some(LineView {
                line: line.clone(),
                from_position,
                to_position,
            })
        })
        .collect();

    Json(ApiResponse::success(DiagramView {
        canvas: diagram.canvas,
        buses: diagram.buses.values().cloned().collect(),
        sources: diagram.sources.values().cloned().collect(),
        loads: diagram.loads.values().cloned().collect(),
        lines,
        unresolved: state.diagram.unresolved.clone(),
    }))
}
