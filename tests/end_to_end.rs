//! Whole-pipeline scenarios, one per worked example in spec §8: each feeds
//! a complete source file through `compile_source` and checks the shape of
//! the result (or which error channel rejects it), the way `nanoda`'s own
//! integration tests run whole `.export` files through the checker rather
//! than poking individual passes.

use vehicle_core::compile_source;
use vehicle_core::errors::{NormError, SmtLibError, TypingError, VehicleError};

/// S1: a property with no network reference normalises fine but has
/// nothing for the VNNLib backend to quantify over.
#[test]
fn s1_property_with_no_network_is_rejected_at_lowering() {
    let src = "prop : Prop;\nprop = 1 + 2 == 3;\n";
    let err = compile_source(src).unwrap_err();
    match err {
        VehicleError::SmtLib(SmtLibError::NoNetworkUsedInProperty(id)) => {
            assert_eq!(id.to_string(), "prop");
        }
        other => panic!("expected NoNetworkUsedInProperty, got {other:?}"),
    }
}

/// S2: one network, one magic input/output block.
#[test]
fn s2_single_network_safety_property() {
    let src = "\
        network f : Tensor Real [1] -> Tensor Real [1];\n\
        p : Prop;\n\
        p = every x : Tensor Real [1] . let y = f x in (y ! 0) >= 0.0;\n\
    ";
    let scripts = compile_source(src).expect("should compile");
    assert_eq!(scripts.len(), 1);
    let script = &scripts[0];
    assert_eq!(script.meta_network.len(), 1);
    assert_eq!(script.meta_network[0].to_string(), "f");
    assert_eq!(script.num_inputs, 1);
    assert_eq!(script.num_outputs, 1);
}

/// S3: two networks sharing one quantified input get folded into a single
/// meta-network, in first-occurrence order, with their widths summed.
#[test]
fn s3_two_networks_share_a_quantified_input() {
    let src = "\
        network f : Tensor Real [2] -> Tensor Real [1];\n\
        network g : Tensor Real [2] -> Tensor Real [1];\n\
        p : Prop;\n\
        p = every x : Tensor Real [2] . let y1 = f x in let y2 = g x in (y1 ! 0) == (y2 ! 0);\n\
    ";
    let scripts = compile_source(src).expect("should compile");
    assert_eq!(scripts.len(), 1);
    let script = &scripts[0];
    assert_eq!(script.meta_network.iter().map(|id| id.to_string()).collect::<Vec<_>>(), vec!["f", "g"]);
    assert_eq!(script.num_inputs, 4);
    assert_eq!(script.num_outputs, 2);
}

/// S4: an unannotated quantified variable whose only use is `==` leaves
/// the `HasEq`/`IsTruth` instance goals unsolved — no declared type ever
/// pins `x`'s element type down.
#[test]
fn s4_unannotated_equality_leaves_constraints_unsolved() {
    let src = "p : Prop;\np = every x . x == x;\n";
    let err = compile_source(src).unwrap_err();
    assert!(matches!(err, VehicleError::Typing(TypingError::UnsolvedConstraints(_))));
}

/// S5: quantifying over a domain that normalises to the empty sequence is
/// rejected at the point the backend would otherwise emit a vacuous
/// quantifier.
#[test]
fn s5_quantifying_over_an_empty_domain_is_rejected() {
    let src = "p : Prop;\np = every x in ([] : List Nat) . x > 0;\n";
    let err = compile_source(src).unwrap_err();
    match err {
        VehicleError::SmtLib(SmtLibError::NormalisationError(msg)) => {
            assert!(msg.contains("empty container"), "unexpected message: {msg}");
        }
        VehicleError::Norm(NormError::EmptyQuantifierDomain(_)) => {}
        other => panic!("expected an empty-domain rejection, got {other:?}"),
    }
}

/// S6: a polymorphic identity applied at `Bool` twice, both implicit type
/// arguments machine-inserted, normalises away entirely — nothing left
/// for the VNNLib backend to quantify over, same rejection channel as S1.
#[test]
fn s6_polymorphic_identity_normalises_to_a_literal() {
    let src = "\
        id : {t : Type 0} -> t -> t;\n\
        id x = x;\n\
        p : Prop;\n\
        p = id True and id True;\n\
    ";
    let err = compile_source(src).unwrap_err();
    assert!(matches!(err, VehicleError::SmtLib(SmtLibError::NoNetworkUsedInProperty(_))));
}
