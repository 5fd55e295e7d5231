// Path: crates/ipc/src/lib.rs
//! # Plugin VM IPC
//!
//! The control plane between the node and an out-of-process VM plugin:
//! gRPC via `tonic`. The node calls the plugin through the `vm` service; the
//! plugin calls back into node-local subsystems through the proxy services
//! (`rpcdb`, `keystore`, `sharedmemory`, `aliasreader`, `subnetlookup`,
//! `appsender`, `validatorstate`, `messenger`). HTTP handlers the plugin
//! exposes are reached through `ghttp`.

/// Listener, serving, dialing and wire-conversion helpers.
pub mod grpcutils;

// Re-export the generated Protobuf/Tonic code, one module per proto package.
pub mod vm {
    tonic::include_proto!("vm");
}

pub mod rpcdb {
    tonic::include_proto!("rpcdb");
}

pub mod keystore {
    tonic::include_proto!("keystore");
}

pub mod sharedmemory {
    tonic::include_proto!("sharedmemory");
}

pub mod aliasreader {
    tonic::include_proto!("aliasreader");
}

pub mod subnetlookup {
    tonic::include_proto!("subnetlookup");
}

pub mod appsender {
    tonic::include_proto!("appsender");
}

pub mod validatorstate {
    tonic::include_proto!("validatorstate");
}

pub mod messenger {
    tonic::include_proto!("messenger");
}

pub mod ghttp {
    tonic::include_proto!("ghttp");
}

#[cfg(test)]
mod tests;
