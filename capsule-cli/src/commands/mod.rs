pub mod build;
pub mod images;
pub mod inspect;
pub mod rmi;
pub mod run;
pub mod runtime;
