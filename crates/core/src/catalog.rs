//! Operation catalog: the capability through which the host consumes a
//! controller.
//!
//! A controller is any type implementing [`Controller`]: it describes its
//! operations (name plus ordered parameter schema) and invokes one of them
//! by name with an already-bound [`Arguments`] list. The host never looks
//! at how a controller is defined; it only builds a [`Catalog`] from the
//! descriptors once, at registration, and resolves operations against it.
//!
//! [`OperationTable`] is the ready-made controller: a list of descriptors,
//! each paired with an async handler closure.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{CatalogError, InvocationError};
use crate::value::{FromValue, ParamType, Value};

// ──────────────────────────────────────────────
// Descriptors
// ──────────────────────────────────────────────

/// One formal parameter of an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub optional: bool,
    /// The declared default value, if the declaration carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    /// A required parameter with no declared default.
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        ParamSpec {
            name: name.into(),
            ty,
            optional: false,
            default: None,
        }
    }

    /// An optional parameter; binds `Null` when the request omits it.
    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        ParamSpec {
            optional: true,
            ..ParamSpec::required(name, ty)
        }
    }

    /// Attach a declared default value.
    ///
    /// On a required parameter this triggers the zero-value binding rule:
    /// when the request omits it, the type's zero instance is bound.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Name and ordered parameter schema of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub params: Vec<ParamSpec>,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        OperationDescriptor {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }
}

// ──────────────────────────────────────────────
// Arguments
// ──────────────────────────────────────────────

/// Bound arguments in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    entries: Vec<(String, Value)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.entries.push((name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The raw bound value for `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// The bound value for `name`, read as `T`.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T, InvocationError> {
        let value = self
            .value(name)
            .ok_or_else(|| InvocationError::MissingArgument(name.to_string()))?;
        T::from_value(value).map_err(|source| InvocationError::Argument {
            name: name.to_string(),
            source,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

// ──────────────────────────────────────────────
// Controller
// ──────────────────────────────────────────────

/// A named group of callable operations.
///
/// Implementations must be `Send + Sync + 'static`: one instance serves
/// every concurrent request routed to it.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    /// Every operation this controller exposes.
    fn operations(&self) -> Vec<OperationDescriptor>;

    /// Invoke `operation` with arguments bound against its descriptor.
    async fn invoke(
        &self,
        operation: &str,
        args: Arguments,
    ) -> Result<serde_json::Value, InvocationError>;
}

type OperationFuture =
    Pin<Box<dyn Future<Output = Result<serde_json::Value, InvocationError>> + Send>>;
type Handler = Arc<dyn Fn(Arguments) -> OperationFuture + Send + Sync>;

/// A controller assembled from descriptor/handler pairs.
///
/// ```
/// use resthost_core::{OperationDescriptor, OperationTable, ParamSpec, ParamType};
///
/// let table = OperationTable::new().operation(
///     OperationDescriptor::new("Double").param(ParamSpec::required("n", ParamType::Int32)),
///     |args| async move { Ok(args.get::<i32>("n")? * 2) },
/// );
/// assert_eq!(table.len(), 1);
/// ```
#[derive(Default)]
pub struct OperationTable {
    entries: Vec<(OperationDescriptor, Handler)>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation. The handler's return value is serialized to JSON;
    /// `()` becomes `null`.
    pub fn operation<F, Fut, T>(mut self, descriptor: OperationDescriptor, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, InvocationError>> + Send + 'static,
        T: Serialize,
    {
        let handler: Handler = Arc::new(move |args| {
            let fut = handler(args);
            Box::pin(async move {
                let result = fut.await?;
                Ok(serde_json::to_value(result)?)
            }) as OperationFuture
        });
        self.entries.push((descriptor, handler));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Controller for OperationTable {
    fn operations(&self) -> Vec<OperationDescriptor> {
        self.entries
            .iter()
            .map(|(descriptor, _)| descriptor.clone())
            .collect()
    }

    async fn invoke(
        &self,
        operation: &str,
        args: Arguments,
    ) -> Result<serde_json::Value, InvocationError> {
        let handler = self
            .entries
            .iter()
            .find(|(descriptor, _)| descriptor.name == operation)
            .map(|(_, handler)| Arc::clone(handler))
            .ok_or_else(|| InvocationError::UnknownOperation(operation.to_string()))?;
        handler(args).await
    }
}

// ──────────────────────────────────────────────
// Catalog
// ──────────────────────────────────────────────

/// The validated, read-only operation index of one controller.
#[derive(Debug, Clone)]
pub struct Catalog {
    operations: Vec<OperationDescriptor>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Index a controller's operations.
    ///
    /// Rejects empty names, operations sharing a name (no overloading),
    /// and operations declaring the same parameter twice.
    pub fn build(controller: &dyn Controller) -> Result<Self, CatalogError> {
        Self::from_descriptors(controller.operations())
    }

    pub fn from_descriptors(operations: Vec<OperationDescriptor>) -> Result<Self, CatalogError> {
        let mut by_name = HashMap::with_capacity(operations.len());
        for (index, op) in operations.iter().enumerate() {
            if op.name.trim().is_empty() {
                return Err(CatalogError::EmptyOperationName);
            }
            if by_name.insert(op.name.clone(), index).is_some() {
                return Err(CatalogError::DuplicateOperation(op.name.clone()));
            }
            for (i, param) in op.params.iter().enumerate() {
                if op.params[..i].iter().any(|p| p.name == param.name) {
                    return Err(CatalogError::DuplicateParameter {
                        operation: op.name.clone(),
                        parameter: param.name.clone(),
                    });
                }
            }
        }
        Ok(Catalog {
            operations,
            by_name,
        })
    }

    /// All operations, in the order the controller declared them.
    pub fn list_operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    /// Exact, case-sensitive lookup.
    pub fn find_operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.by_name.get(name).map(|&index| &self.operations[index])
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> OperationTable {
        OperationTable::new()
            .operation(
                OperationDescriptor::new("GetList")
                    .param(ParamSpec::required("count", ParamType::Int32)),
                |args| async move {
                    let count = args.get::<i32>("count")?;
                    Ok((1..=count).collect::<Vec<_>>())
                },
            )
            .operation(OperationDescriptor::new("Ping"), |_| async { Ok(()) })
    }

    #[test]
    fn catalog_lists_operations_in_declaration_order() {
        let catalog = Catalog::build(&sample_table()).unwrap();
        let names: Vec<_> = catalog
            .list_operations()
            .iter()
            .map(|op| op.name.as_str())
            .collect();
        assert_eq!(names, ["GetList", "Ping"]);
    }

    #[test]
    fn find_operation_is_exact_and_case_sensitive() {
        let catalog = Catalog::build(&sample_table()).unwrap();
        assert!(catalog.find_operation("GetList").is_some());
        assert!(catalog.find_operation("getlist").is_none());
        assert!(catalog.find_operation("Get").is_none());
    }

    #[test]
    fn duplicate_operation_names_are_rejected() {
        let table = sample_table().operation(OperationDescriptor::new("Ping"), |_| async {
            Ok(())
        });
        assert_eq!(
            Catalog::build(&table).unwrap_err(),
            CatalogError::DuplicateOperation("Ping".to_string())
        );
    }

    #[test]
    fn duplicate_parameter_names_are_rejected() {
        let ops = vec![OperationDescriptor::new("Add")
            .param(ParamSpec::required("a", ParamType::Int32))
            .param(ParamSpec::required("a", ParamType::Int32))];
        assert!(matches!(
            Catalog::from_descriptors(ops),
            Err(CatalogError::DuplicateParameter { .. })
        ));
    }

    #[test]
    fn empty_operation_name_is_rejected() {
        let ops = vec![OperationDescriptor::new("  ")];
        assert_eq!(
            Catalog::from_descriptors(ops).unwrap_err(),
            CatalogError::EmptyOperationName
        );
    }

    #[tokio::test]
    async fn table_invokes_handler_and_serializes_result() {
        let mut args = Arguments::new();
        args.push("count", Value::Int(3));
        let result = sample_table().invoke("GetList", args).await.unwrap();
        assert_eq!(result, serde_json::json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn unit_result_serializes_to_null() {
        let result = sample_table().invoke("Ping", Arguments::new()).await.unwrap();
        assert_eq!(result, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn table_reports_unknown_operation() {
        let err = sample_table()
            .invoke("Missing", Arguments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InvocationError::UnknownOperation(name) if name == "Missing"));
    }

    #[test]
    fn arguments_report_missing_and_mistyped_values() {
        let mut args = Arguments::new();
        args.push("name", Value::Int(1));
        assert!(matches!(
            args.get::<String>("name"),
            Err(InvocationError::Argument { .. })
        ));
        assert!(matches!(
            args.get::<i32>("other"),
            Err(InvocationError::MissingArgument(_))
        ));
    }

    #[test]
    fn descriptors_serialize_with_type_names() {
        let op = OperationDescriptor::new("EchoList")
            .param(ParamSpec::required("nums", ParamType::array_of(ParamType::Int32)));
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            serde_json::json!({
                "name": "EchoList",
                "params": [{"name": "nums", "type": "int[]", "optional": false}]
            })
        );
    }
}
