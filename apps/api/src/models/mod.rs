pub mod freelancer;
pub mod job;
pub mod market;
pub mod outcome;
