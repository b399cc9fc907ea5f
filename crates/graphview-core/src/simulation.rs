//! Contract with the external force simulation.
//!
//! The layout algorithm itself lives outside this crate. The renderer only
//! registers the graph, changes the simulation's temperature around drags,
//! and asks for an initial precomputed layout.

use crate::graph::GraphModel;

/// Alpha target applied while the user drags a node.
pub const DRAG_ALPHA_TARGET: f64 = 0.3;

/// Force simulation driven by the renderer.
///
/// Implementations read pins through [`crate::graph::Node::fixed_position`]
/// and write positions straight into the model.
pub trait ForceSimulation {
    /// Register (or replace) the node and relationship sets.
    fn update_graph(&mut self, graph: &GraphModel);

    /// Set the alpha target and restart the tick loop.
    fn reheat(&mut self, alpha_target: f64);

    /// Restart the tick loop at full temperature after a structural change.
    fn restart(&mut self);

    /// Let the temperature decay back to its resting value.
    fn settle(&mut self);

    /// Fast-forward to a stable layout synchronously, then start the live
    /// tick loop. Returns once the precomputed layout is in the model.
    fn precompute_and_start(&mut self, graph: &mut GraphModel);

    /// Advance one tick. Returns false once the simulation has come to rest.
    fn tick(&mut self, graph: &mut GraphModel) -> bool;

    /// Whether ticks are still being produced.
    fn is_running(&self) -> bool;

    fn stop(&mut self);
}
