//! Controller types compiled into the `resthost` binary.
//!
//! | Type name | Operations |
//! |---|---|
//! | `TestService.ServiceClass` | `GetList(count: int)`, `EchoList(nums: int[])` |
//! | `TestService.Diagnostics` | `Echo(text: string)`, `Delay(ms: uint)` |

use std::sync::Arc;
use std::time::Duration;

use resthost_core::{Controller, OperationDescriptor, OperationTable, ParamSpec, ParamType};
use resthost_server::{ProvisionError, Provisioner};

pub const SERVICE_CLASS: &str = "TestService.ServiceClass";
pub const DIAGNOSTICS: &str = "TestService.Diagnostics";

/// A provisioner knowing every built-in controller type.
pub fn provisioner() -> Result<Provisioner, ProvisionError> {
    let mut provisioner = Provisioner::new();
    register_builtins(&mut provisioner)?;
    Ok(provisioner)
}

fn register_builtins(provisioner: &mut Provisioner) -> Result<(), ProvisionError> {
    provisioner.register(SERVICE_CLASS, service_class)?;
    provisioner.register(DIAGNOSTICS, diagnostics)?;
    Ok(())
}

pub fn service_class() -> Arc<dyn Controller> {
    Arc::new(
        OperationTable::new()
            .operation(
                OperationDescriptor::new("GetList")
                    .param(ParamSpec::required("count", ParamType::Int32)),
                |args| async move {
                    let count = args.get::<i32>("count")?;
                    Ok((1..=count).collect::<Vec<i32>>())
                },
            )
            .operation(
                OperationDescriptor::new("EchoList").param(ParamSpec::required(
                    "nums",
                    ParamType::array_of(ParamType::Int32),
                )),
                |args| async move { args.get::<Vec<i32>>("nums") },
            ),
    )
}

pub fn diagnostics() -> Arc<dyn Controller> {
    Arc::new(
        OperationTable::new()
            .operation(
                OperationDescriptor::new("Echo")
                    .param(ParamSpec::required("text", ParamType::String)),
                |args| async move { args.get::<String>("text") },
            )
            .operation(
                OperationDescriptor::new("Delay").param(ParamSpec::required("ms", ParamType::UInt32)),
                |args| async move {
                    let ms = args.get::<u32>("ms")?;
                    tokio::time::sleep(Duration::from_millis(u64::from(ms))).await;
                    Ok(ms)
                },
            ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use resthost_core::{Arguments, Value};

    #[tokio::test]
    async fn get_list_counts_from_one() {
        let mut args = Arguments::new();
        args.push("count", Value::Int(5));
        let result = service_class().invoke("GetList", args).await.unwrap();
        assert_eq!(result, serde_json::json!([1, 2, 3, 4, 5]));
    }

    #[tokio::test]
    async fn get_list_of_zero_is_empty() {
        let mut args = Arguments::new();
        args.push("count", Value::Null);
        let result = service_class().invoke("GetList", args).await.unwrap();
        assert_eq!(result, serde_json::json!([]));
    }

    #[tokio::test]
    async fn echo_list_returns_its_input() {
        let mut args = Arguments::new();
        args.push(
            "nums",
            Value::Array(vec![Value::Int(3), Value::Int(1), Value::Int(2)]),
        );
        let result = service_class().invoke("EchoList", args).await.unwrap();
        assert_eq!(result, serde_json::json!([3, 1, 2]));
    }

    #[test]
    fn provisioner_knows_both_types() {
        let provisioner = provisioner().unwrap();
        let names: Vec<_> = provisioner.type_names().collect();
        assert_eq!(names, [DIAGNOSTICS, SERVICE_CLASS]);
        assert!(provisioner.create(SERVICE_CLASS).is_some());
    }

    #[test]
    fn registering_builtins_twice_is_reported() {
        let mut provisioner = provisioner().unwrap();
        assert_eq!(
            register_builtins(&mut provisioner).unwrap_err(),
            ProvisionError::DuplicateType(SERVICE_CLASS.to_string())
        );
    }
}
