mod core;
mod hermite;

pub use core::{Tolerance, Vec3};
pub use hermite::{
    CurveError, CurveLocation, CurveSamples, GAUSS_WT4, GAUSS_XI4, LineSmoothing, MagnitudeScaling,
    compute_cubic_hermite_arc_length, compute_cubic_hermite_derivative_scaling,
    cubic_hermite_arc_length, cubic_hermite_arc_length_to_xi, cubic_hermite_basis,
    cubic_hermite_basis_first_derivatives, cubic_hermite_basis_second_derivatives,
    cubic_hermite_curvature, cubic_hermite_curvature_simple, cubic_hermite_curves_length,
    cubic_hermite_curves_point_at_arc_distance, curvatures_along_curve, graded_element_lengths,
    interpolate_cubic_hermite, interpolate_cubic_hermite_derivative,
    interpolate_cubic_hermite_scalar, interpolate_cubic_hermite_second_derivative,
    interpolate_hermite_lagrange_derivative, interpolate_lagrange_hermite_derivative,
    interpolate_sample_cubic_hermite, interpolate_sample_linear, sample_cubic_element_lengths,
    sample_cubic_hermite_curves, smooth_cubic_hermite_derivatives_line,
    smooth_cubic_hermite_derivatives_loop,
};
