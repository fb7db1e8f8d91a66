/*!
Output of discovered switches. Image rendering is left to external tools reading these formats.
*/

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

use crate::network::{graph::TopologyGraph, switch::Switch};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize topology: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait TopologyRenderer {
    fn render(&self, switches: &[Switch], out: &mut dyn Write) -> Result<(), RenderError>;
}

/// Pretty-printed JSON of the switch model.
pub struct JsonRenderer;

#[derive(Serialize)]
struct JsonDocument<'a> {
    switches: &'a [Switch],
}

impl TopologyRenderer for JsonRenderer {
    fn render(&self, switches: &[Switch], out: &mut dyn Write) -> Result<(), RenderError> {
        serde_json::to_writer_pretty(&mut *out, &JsonDocument { switches })?;
        writeln!(out)?;
        Ok(())
    }
}

/// Graphviz DOT of the topology graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotRenderer {
    pub skip_empty_ports: bool,
}

impl TopologyRenderer for DotRenderer {
    fn render(&self, switches: &[Switch], out: &mut dyn Write) -> Result<(), RenderError> {
        let graph = TopologyGraph::build_new(switches, self.skip_empty_ports);
        out.write_all(graph.to_dot().as_bytes())?;
        Ok(())
    }
}
