//! Council deliberation types and pure logic.
//!
//! The council flow produces three kinds of artifacts per turn:
//! - [`ModelOpinion`](opinion::ModelOpinion): a councilor's answer from the first-opinions stage
//! - [`ReviewResult`](review::ReviewResult): a reviewer's ranking of anonymized opinions
//! - [`CouncilTurn`](turn::CouncilTurn): the complete record of one user turn
//!
//! [`parsing`] and [`aggregate`] hold the pure functions that turn raw
//! reviewer replies into rankings and rankings into the summary fed to
//! the chairman.

pub mod aggregate;
pub mod descriptor;
pub mod event;
pub mod opinion;
pub mod parsing;
pub mod review;
pub mod stage;
pub mod turn;
