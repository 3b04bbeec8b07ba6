//! Compiler core for the Vehicle neural network specification language
//! (spec §1): surface parsing, scope checking, bidirectional elaboration,
//! normalisation and VNNLib lowering, wired together behind one
//! `compile_source` entry point. The CLI in `main.rs` is a thin driver over
//! this crate; everything that does real work lives here so it can also be
//! driven from tests (`tests/end_to_end.rs`) without going through a
//! subprocess.

#![forbid(unsafe_code)]

pub mod builtins;
pub mod cli;
pub mod debruijn;
pub mod elaborate;
pub mod env;
pub mod errors;
pub mod expr;
pub mod lexer;
pub mod name;
pub mod normalise;
pub mod parser;
pub mod program;
pub mod provenance;
pub mod scope;
pub mod vnnlib;

use env::Env;
use errors::VehicleError;
use vnnlib::VnnLibScript;

/// Runs the whole pipeline over one source file's contents: parse, scope
/// check, elaborate, then lower every `Prop`-typed declaration to VNNLib.
/// Each stage's error converts into `VehicleError` via `?`, so the caller
/// only has to handle one error type.
pub fn compile_source(src: &str) -> Result<Vec<VnnLibScript>, VehicleError> {
    let surface = parser::parse_program(src)?;
    let scoped = scope::scope_check_program(&surface)?;
    let mut env = Env::new();
    let core = elaborate::elaborate_program(&mut env, &scoped)?;
    let scripts = vnnlib::lower_program(&env, &core)?;
    Ok(scripts)
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn compiles_a_single_network_safety_property() {
        let src = "\
            network f : Tensor Real [1] -> Tensor Real [1];\n\
            safe = every x : Tensor Real [1] . let y = f x in (y ! 0) >= 0.0;\n\
        ";
        let scripts = compile_source(src).expect("pipeline should succeed");
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].num_inputs, 1);
        assert_eq!(scripts[0].num_outputs, 1);
    }

    #[test]
    fn rejects_a_program_with_no_properties() {
        let src = "network f : Tensor Real [1] -> Tensor Real [1];\n";
        let err = compile_source(src).unwrap_err();
        assert!(matches!(err, VehicleError::SmtLib(errors::SmtLibError::NoPropertiesFound)));
    }
}
