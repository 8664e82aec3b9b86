//! Public macros for building raw inputs.

/// Builds a [`RawInputs`](crate::RawInputs) from `name => value` pairs.
///
/// Values are anything convertible into a `serde_json::Value`.
///
/// # Examples
///
/// ```
/// use fibre_inject::raw_inputs;
///
/// let inputs = raw_inputs! {
///   "q" => "foo",
///   "skip" => "100",
///   "limit" => 200,
/// };
/// assert_eq!(inputs.len(), 3);
/// assert_eq!(inputs.get("limit"), Some(&serde_json::json!(200)));
/// ```
#[macro_export]
macro_rules! raw_inputs {
  () => {
    $crate::RawInputs::new()
  };

  ($($name:expr => $value:expr),+ $(,)?) => {{
    let mut inputs = $crate::RawInputs::new();
    $(
      inputs.insert($name, $value);
    )+
    inputs
  }};
}
