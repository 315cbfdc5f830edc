//! Mapping from bridge method names to `hwi` subcommands.
//!
//! Each method lists its positional JSON arguments in call order, together
//! with how each one is rendered on the `hwi` command line.

use crate::domain::bridge::OperationScope;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ParamKind {
    /// Required; rendered after `--` so values starting with `-` stay literal.
    Positional,
    /// `--flag=value`; omitted when the argument is missing or null.
    Value(&'static str),
    /// Bare flag emitted when the argument is `true`.
    Switch(&'static str),
    /// `on` when `true`, `off` when `false`, nothing when null.
    Toggle {
        on: &'static str,
        off: &'static str,
    },
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    /// Placed before the subcommand (top-level `hwi` option).
    pub global: bool,
}

const fn positional(name: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::Positional,
        global: false,
    }
}

const fn value(name: &'static str, flag: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::Value(flag),
        global: false,
    }
}

const fn switch(name: &'static str, flag: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::Switch(flag),
        global: false,
    }
}

const fn toggle(name: &'static str, on: &'static str, off: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::Toggle { on, off },
        global: false,
    }
}

const fn global(param: Param) -> Param {
    Param {
        global: true,
        ..param
    }
}

#[derive(Debug)]
pub(crate) struct HwiCommand {
    pub method: &'static str,
    pub subcommand: &'static str,
    pub scope: OperationScope,
    pub params: &'static [Param],
}

pub(crate) const CATALOG: &[HwiCommand] = &[
    HwiCommand {
        method: "enumerate",
        subcommand: "enumerate",
        scope: OperationScope::Direct,
        params: &[
            global(value("password", "--password")),
            global(switch("expert", "--expert")),
            global(value("chain", "--chain")),
            global(switch("allow_emulators", "--emulators")),
        ],
    },
    HwiCommand {
        method: "getmasterxpub",
        subcommand: "getmasterxpub",
        scope: OperationScope::Device,
        params: &[value("addrtype", "--addr-type"), value("account", "--account")],
    },
    HwiCommand {
        method: "signtx",
        subcommand: "signtx",
        scope: OperationScope::Device,
        params: &[positional("psbt")],
    },
    HwiCommand {
        method: "getxpub",
        subcommand: "getxpub",
        scope: OperationScope::Device,
        params: &[positional("path"), global(switch("expert", "--expert"))],
    },
    HwiCommand {
        method: "signmessage",
        subcommand: "signmessage",
        scope: OperationScope::Device,
        params: &[positional("message"), positional("path")],
    },
    HwiCommand {
        method: "getkeypool",
        subcommand: "getkeypool",
        scope: OperationScope::Device,
        params: &[
            value("path", "--path"),
            positional("start"),
            positional("end"),
            switch("internal", "--internal"),
            toggle("keypool", "--keypool", "--nokeypool"),
            value("account", "--account"),
            value("addr_type", "--addr-type"),
            switch("addr_all", "--all"),
        ],
    },
    HwiCommand {
        method: "getdescriptors",
        subcommand: "getdescriptors",
        scope: OperationScope::Device,
        params: &[value("account", "--account")],
    },
    HwiCommand {
        method: "displayaddress",
        subcommand: "displayaddress",
        scope: OperationScope::Device,
        params: &[
            value("path", "--path"),
            value("desc", "--desc"),
            value("addr_type", "--addr-type"),
        ],
    },
    HwiCommand {
        method: "setup_device",
        subcommand: "setup",
        scope: OperationScope::Device,
        params: &[
            value("label", "--label"),
            value("backup_passphrase", "--backup_passphrase"),
        ],
    },
    HwiCommand {
        method: "wipe_device",
        subcommand: "wipe",
        scope: OperationScope::Device,
        params: &[],
    },
    HwiCommand {
        method: "restore_device",
        subcommand: "restore",
        scope: OperationScope::Device,
        params: &[value("label", "--label"), value("word_count", "--word_count")],
    },
    HwiCommand {
        method: "backup_device",
        subcommand: "backup",
        scope: OperationScope::Device,
        params: &[
            value("label", "--label"),
            value("backup_passphrase", "--backup_passphrase"),
        ],
    },
    HwiCommand {
        method: "prompt_pin",
        subcommand: "promptpin",
        scope: OperationScope::Device,
        params: &[],
    },
    HwiCommand {
        method: "send_pin",
        subcommand: "sendpin",
        scope: OperationScope::Device,
        params: &[positional("pin")],
    },
    HwiCommand {
        method: "toggle_passphrase",
        subcommand: "togglepassphrase",
        scope: OperationScope::Device,
        params: &[],
    },
];

pub(crate) fn lookup(method: &str) -> Option<&'static HwiCommand> {
    CATALOG.iter().find(|command| command.method == method)
}
