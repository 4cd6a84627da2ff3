pub mod configure;
pub mod deployment;
pub mod feature;
pub mod observability;
pub mod openrc;

/// Output format of listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Table,
    Yaml,
}
