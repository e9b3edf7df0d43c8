//! Parameter binding: request parameters to typed operation arguments.
//!
//! The [`ParameterMap`] collects query-string pairs and, for a `POST` with
//! a non-empty body, the pairs of the URL-decoded form body. A key repeated
//! within one source keeps every value, joined with `,`. A key supplied by
//! both sources is a [`BindingError::DuplicateParameter`]; no precedence
//! between the two is assumed.
//!
//! [`bind`] then walks the operation's formal parameters in order:
//! 1. a supplied value is coerced to the declared type;
//! 2. a missing, non-optional parameter that declares a default binds the
//!    type's zero value (not the declared default);
//! 3. anything else missing binds `Null`.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use url::form_urlencoded;

use crate::catalog::{Arguments, OperationDescriptor};
use crate::error::BindingError;
use crate::request::IncomingRequest;
use crate::value::{coerce, zero_value, Value};

/// Raw request parameters keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMap {
    values: HashMap<String, String>,
}

impl ParameterMap {
    pub fn from_request(request: &IncomingRequest) -> Result<Self, BindingError> {
        let mut map = ParameterMap::default();

        if let Some(query) = &request.query {
            map.merge(collect_pairs(query))?;
        }

        if request.method == "POST" && !request.body.is_empty() {
            let body =
                std::str::from_utf8(&request.body).map_err(|_| BindingError::InvalidBody)?;
            map.merge(collect_pairs(&url_decode(body)))?;
        }

        Ok(map)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn merge(&mut self, source: HashMap<String, String>) -> Result<(), BindingError> {
        for (key, value) in source {
            if self.values.contains_key(&key) {
                return Err(BindingError::DuplicateParameter(key));
            }
            self.values.insert(key, value);
        }
        Ok(())
    }
}

/// Parse one form-encoded source, joining repeated keys with `,`.
fn collect_pairs(input: &str) -> HashMap<String, String> {
    let mut pairs: HashMap<String, String> = HashMap::new();
    for (key, value) in form_urlencoded::parse(input.as_bytes()) {
        pairs
            .entry(key.into_owned())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    pairs
}

/// Decode the whole body once (`+` to space, `%XX` escapes) before it is
/// parsed as a form.
fn url_decode(body: &str) -> String {
    let spaced = body.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Bind the request's parameters against `descriptor`.
///
/// Parameters are only extracted when the operation declares any, so a
/// parameterless operation never fails binding.
pub fn bind(
    descriptor: &OperationDescriptor,
    request: &IncomingRequest,
) -> Result<Arguments, BindingError> {
    let mut arguments = Arguments::new();
    if descriptor.params.is_empty() {
        return Ok(arguments);
    }

    let parameters = ParameterMap::from_request(request)?;
    for spec in &descriptor.params {
        let value = match parameters.get(&spec.name) {
            Some(raw) => coerce(Some(raw), &spec.ty).map_err(|e| e.for_parameter(&spec.name))?,
            None if !spec.optional && spec.default.is_some() => zero_value(&spec.ty),
            None => Value::Null,
        };
        arguments.push(spec.name.clone(), value);
    }
    Ok(arguments)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ParamSpec;
    use crate::value::ParamType;

    fn op(params: Vec<ParamSpec>) -> OperationDescriptor {
        params
            .into_iter()
            .fold(OperationDescriptor::new("Op"), OperationDescriptor::param)
    }

    #[test]
    fn query_values_are_decoded() {
        let request = IncomingRequest::get("/x?name=a%20b&greeting=hi+there");
        let map = ParameterMap::from_request(&request).unwrap();
        assert_eq!(map.get("name"), Some("a b"));
        assert_eq!(map.get("greeting"), Some("hi there"));
    }

    #[test]
    fn repeated_query_keys_are_joined() {
        let request = IncomingRequest::get("/x?n=1&n=2&n=3");
        let map = ParameterMap::from_request(&request).unwrap();
        assert_eq!(map.get("n"), Some("1,2,3"));
    }

    #[test]
    fn post_body_adds_parameters() {
        let request = IncomingRequest::post("/x?a=1", "b=2&c=3");
        let map = ParameterMap::from_request(&request).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("b"), Some("2"));
    }

    #[test]
    fn body_is_ignored_for_get() {
        let mut request = IncomingRequest::get("/x");
        request.body = b"a=1".to_vec();
        assert!(ParameterMap::from_request(&request).unwrap().is_empty());
    }

    #[test]
    fn body_is_url_decoded_before_parsing() {
        // The encoded separator becomes a real one once the body is decoded.
        let request = IncomingRequest::post("/x", "a=1%26b%3D2");
        let map = ParameterMap::from_request(&request).unwrap();
        assert_eq!(map.get("a"), Some("1"));
        assert_eq!(map.get("b"), Some("2"));
    }

    #[test]
    fn key_in_query_and_body_is_a_conflict() {
        let request = IncomingRequest::post("/x?a=1", "a=2");
        assert_eq!(
            ParameterMap::from_request(&request).unwrap_err(),
            BindingError::DuplicateParameter("a".to_string())
        );
    }

    #[test]
    fn non_utf8_body_is_rejected() {
        let request = IncomingRequest::post("/x", vec![0xffu8, 0xfe]);
        assert_eq!(
            ParameterMap::from_request(&request).unwrap_err(),
            BindingError::InvalidBody
        );
    }

    #[test]
    fn binds_in_declaration_order() {
        let descriptor = op(vec![
            ParamSpec::required("b", ParamType::Bool),
            ParamSpec::required("n", ParamType::Int32),
        ]);
        let args = bind(&descriptor, &IncomingRequest::get("/x?n=7&b=on")).unwrap();
        let bound: Vec<_> = args.iter().collect();
        assert_eq!(
            bound,
            vec![("b", &Value::Bool(true)), ("n", &Value::Int(7))]
        );
    }

    #[test]
    fn missing_optional_binds_null() {
        let descriptor = op(vec![ParamSpec::optional("n", ParamType::Int32)]);
        let args = bind(&descriptor, &IncomingRequest::get("/x")).unwrap();
        assert_eq!(args.value("n"), Some(&Value::Null));
    }

    #[test]
    fn missing_required_without_default_binds_null() {
        let descriptor = op(vec![ParamSpec::required("n", ParamType::Int32)]);
        let args = bind(&descriptor, &IncomingRequest::get("/x")).unwrap();
        assert_eq!(args.value("n"), Some(&Value::Null));
    }

    // Pins the zero-value rule: a required parameter that declares a default
    // binds the type's zero value when omitted, not the declared default.
    #[test]
    fn missing_required_with_default_binds_zero_value() {
        let descriptor = op(vec![
            ParamSpec::required("n", ParamType::Int32).with_default(Value::Int(5)),
            ParamSpec::required("s", ParamType::String).with_default(Value::Str("x".into())),
        ]);
        let args = bind(&descriptor, &IncomingRequest::get("/x")).unwrap();
        assert_eq!(args.value("n"), Some(&Value::Int(0)));
        assert_eq!(args.value("s"), Some(&Value::Str(String::new())));
    }

    #[test]
    fn optional_with_default_binds_null() {
        let descriptor =
            op(vec![ParamSpec::optional("n", ParamType::Int32).with_default(Value::Int(5))]);
        let args = bind(&descriptor, &IncomingRequest::get("/x")).unwrap();
        assert_eq!(args.value("n"), Some(&Value::Null));
    }

    #[test]
    fn coercion_failure_names_the_parameter() {
        let descriptor = op(vec![ParamSpec::required("flag", ParamType::Bool)]);
        let err = bind(&descriptor, &IncomingRequest::get("/x?flag=maybe")).unwrap_err();
        assert_eq!(err.to_string(), "parameter 'flag': 'maybe' is not a valid bool");
    }

    #[test]
    fn parameterless_operation_skips_extraction() {
        let descriptor = op(Vec::new());
        let request = IncomingRequest::post("/x?a=1", "a=2");
        assert!(bind(&descriptor, &request).unwrap().is_empty());
    }

    #[test]
    fn unknown_parameters_are_ignored() {
        let descriptor = op(vec![ParamSpec::required("n", ParamType::Int32)]);
        let args = bind(&descriptor, &IncomingRequest::get("/x?n=1&extra=2")).unwrap();
        assert_eq!(args.len(), 1);
    }
}
