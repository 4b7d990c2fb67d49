//! Document reference graph and importance computation

mod pagerank;
mod references;

pub use pagerank::{pagerank, DAMPING, EPSILON, MAX_ITERATIONS};
pub use references::{build_reference_graph, extract_references};
