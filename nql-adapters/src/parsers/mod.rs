pub mod palo_alto;

pub use palo_alto::PaloAltoParser;
