//! `resthost routes` -- list every reachable operation without binding.

use serde::Serialize;

use resthost_core::{OperationDescriptor, ParamSpec};
use resthost_server::{ServiceHost, WebService};

use crate::OutputFormat;

#[derive(Debug, Serialize)]
struct ServiceRoutes<'a> {
    name: &'a str,
    urls: &'a [String],
    controllers: Vec<ControllerRoutes<'a>>,
}

#[derive(Debug, Serialize)]
struct ControllerRoutes<'a> {
    name: &'a str,
    operations: &'a [OperationDescriptor],
}

pub fn render(host: &ServiceHost, output: OutputFormat) -> String {
    match output {
        OutputFormat::Json => {
            let services: Vec<_> = host.services().iter().map(service_routes).collect();
            match serde_json::to_string_pretty(&services) {
                Ok(json) => format!("{}\n", json),
                Err(e) => format!("serialization error: {}\n", e),
            }
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for service in host.services() {
                render_service(&mut out, service);
            }
            out
        }
    }
}

fn service_routes(service: &WebService) -> ServiceRoutes<'_> {
    ServiceRoutes {
        name: service.name(),
        urls: service.addresses(),
        controllers: service
            .registry()
            .iter()
            .map(|(name, entry)| ControllerRoutes {
                name,
                operations: entry.catalog.list_operations(),
            })
            .collect(),
    }
}

fn render_service(out: &mut String, service: &WebService) {
    out.push_str(&format!(
        "service {} ({})\n",
        service.name(),
        service.addresses().join(", ")
    ));
    for (controller, entry) in service.registry().iter() {
        for operation in entry.catalog.list_operations() {
            let params: Vec<String> = operation.params.iter().map(render_param).collect();
            out.push_str(&format!(
                "  /{}/{}({})\n",
                controller,
                operation.name,
                params.join(", ")
            ));
        }
    }
}

fn render_param(param: &ParamSpec) -> String {
    let marker = if param.optional { "?" } else { "" };
    format!("{}{}: {}", param.name, marker, param.ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resthost_server::{ControllerConfig, HostConfig, ServiceConfig};

    fn host() -> ServiceHost {
        let config = HostConfig {
            services: vec![ServiceConfig {
                name: "Test".to_string(),
                urls: vec!["127.0.0.1:8080".to_string()],
                controllers: vec![ControllerConfig {
                    name: String::new(),
                    type_name: crate::controllers::SERVICE_CLASS.to_string(),
                }],
            }],
        };
        ServiceHost::new(&config, &crate::controllers::provisioner().unwrap(), Vec::new()).unwrap()
    }

    #[test]
    fn text_lists_operations_with_signatures() {
        assert_eq!(
            render(&host(), OutputFormat::Text),
            "service Test (127.0.0.1:8080)\n  /Default/GetList(count: int)\n  /Default/EchoList(nums: int[])\n"
        );
    }

    #[test]
    fn json_carries_parameter_schemas() {
        let json: serde_json::Value =
            serde_json::from_str(&render(&host(), OutputFormat::Json)).unwrap();
        assert_eq!(json[0]["name"], "Test");
        assert_eq!(json[0]["controllers"][0]["name"], "Default");
        assert_eq!(
            json[0]["controllers"][0]["operations"][1]["params"][0],
            serde_json::json!({"name": "nums", "type": "int[]", "optional": false})
        );
    }
}
