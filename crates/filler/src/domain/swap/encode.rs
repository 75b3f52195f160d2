use {
    super::protocol::{BestProtocol, PoolKey, Protocol, SwapLeg},
    crate::domain::eth::{Address, Bytes, Call, U256},
    alloy::sol_types::{SolCall, SolValue},
};

/// Universal router command bytes.
pub const V3_SWAP_EXACT_OUT: u8 = 0x01;
pub const V2_SWAP_EXACT_OUT: u8 = 0x09;
pub const V4_SWAP: u8 = 0x10;

/// v4 router action bytes.
pub const SWAP_EXACT_OUT_SINGLE: u8 = 0x08;
pub const SETTLE_ALL: u8 = 0x0c;
pub const TAKE_ALL: u8 = 0x0f;

/// Everything call synthesis needs besides the swap itself.
#[derive(Debug, Clone, Copy)]
pub struct SwapContext {
    /// The filler EOA, which receives all swap outputs.
    pub filler: Address,
    pub router: Address,
    /// The wrapped native deployment on the destination chain.
    pub weth: Address,
    /// Absolute unix deadline for the router execution.
    pub deadline: U256,
}

/// Produces the concrete call list for one exact-output swap through the
/// selected protocol. The calls assume execution from the filler account, in
/// order, as the batch executor will run them.
pub fn synthesize(
    ctx: &SwapContext,
    donor: SwapLeg,
    target: SwapLeg,
    best: &BestProtocol,
    amount_out: U256,
) -> Vec<Call> {
    match best.protocol {
        Protocol::V2 | Protocol::V3 => synthesize_v2_v3(ctx, donor, target, best, amount_out),
        Protocol::V4 => synthesize_v4(ctx, donor, target, best, amount_out),
    }
}

fn synthesize_v2_v3(
    ctx: &SwapContext,
    donor: SwapLeg,
    target: SwapLeg,
    best: &BestProtocol,
    amount_out: U256,
) -> Vec<Call> {
    let mut calls = Vec::with_capacity(4);

    // v2/v3 only move ERC20s, so a native donor is wrapped first and the
    // wrapped balance forwarded to the router.
    if donor.is_native() {
        calls.push(Call {
            to: ctx.weth,
            value: best.amount_in,
            data: contracts::WETH9::depositCall {}.abi_encode().into(),
        });
    }
    calls.push(transfer(donor.erc20, ctx.router, best.amount_in));

    let (command, input) = match best.protocol {
        Protocol::V2 => (
            V2_SWAP_EXACT_OUT,
            contracts::router::V2SwapExactOut {
                recipient: ctx.filler,
                amountOut: amount_out,
                amountInMax: best.amount_in,
                path: vec![donor.erc20, target.erc20],
                payerIsUser: false,
            }
            .abi_encode(),
        ),
        Protocol::V3 => (
            V3_SWAP_EXACT_OUT,
            contracts::router::V3SwapExactOut {
                recipient: ctx.filler,
                amountOut: amount_out,
                amountInMax: best.amount_in,
                path: v3_path_exact_out(
                    target.erc20,
                    best.fee.expect("v3 quote always carries a fee"),
                    donor.erc20,
                )
                .into(),
                payerIsUser: false,
            }
            .abi_encode(),
        ),
        Protocol::V4 => unreachable!(),
    };
    calls.push(execute(ctx, command, input.into(), U256::ZERO));

    // The router delivered WETH; unwrap it for the native beneficiary.
    if target.is_native() {
        calls.push(Call {
            to: ctx.weth,
            value: U256::ZERO,
            data: contracts::WETH9::withdrawCall { wad: amount_out }
                .abi_encode()
                .into(),
        });
    }
    calls
}

fn synthesize_v4(
    ctx: &SwapContext,
    donor: SwapLeg,
    target: SwapLeg,
    best: &BestProtocol,
    amount_out: U256,
) -> Vec<Call> {
    let mut calls = Vec::with_capacity(2);
    if !donor.is_native() {
        calls.push(transfer(donor.erc20, ctx.router, best.amount_in));
    }

    let fee = best.fee.expect("v4 quote always carries a fee");
    let key = PoolKey::new(donor.currency(), target.currency(), fee);
    let swap_params = contracts::router::v4::ExactOutputSingleParams {
        poolKey: contracts::router::v4::PoolKey {
            currency0: key.currency0,
            currency1: key.currency1,
            fee: fee.try_into().expect("fee tiers fit in a uint24"),
            tickSpacing: key
                .tick_spacing
                .try_into()
                .expect("tick spacings fit in an int24"),
            hooks: Address::ZERO,
        },
        zeroForOne: donor.currency() == key.currency0,
        amountOut: saturating_u128(amount_out),
        amountInMaximum: saturating_u128(best.amount_in),
        hookData: Bytes::new(),
    };

    let actions = Bytes::from(vec![SWAP_EXACT_OUT_SINGLE, SETTLE_ALL, TAKE_ALL]);
    let params: Vec<Bytes> = vec![
        swap_params.abi_encode().into(),
        (donor.currency(), best.amount_in).abi_encode().into(),
        (target.currency(), amount_out).abi_encode().into(),
    ];
    let input = (actions, params).abi_encode();

    // A native donor funds the settle leg through the call value instead of
    // a prior transfer.
    let value = if donor.is_native() {
        best.amount_in
    } else {
        U256::ZERO
    };
    calls.push(execute(ctx, V4_SWAP, input.into(), value));
    calls
}

/// The v3 exact-output path: hops are encoded output-to-input.
fn v3_path_exact_out(token_out: Address, fee: u32, token_in: Address) -> Vec<u8> {
    let mut path = Vec::with_capacity(43);
    path.extend_from_slice(token_out.as_slice());
    path.extend_from_slice(&fee.to_be_bytes()[1..]);
    path.extend_from_slice(token_in.as_slice());
    path
}

fn transfer(token: Address, to: Address, amount: U256) -> Call {
    Call {
        to: token,
        value: U256::ZERO,
        data: contracts::ERC20::transferCall { to, amount }
            .abi_encode()
            .into(),
    }
}

fn execute(ctx: &SwapContext, command: u8, input: Bytes, value: U256) -> Call {
    Call {
        to: ctx.router,
        value,
        data: contracts::UniversalRouter::executeCall {
            commands: Bytes::from(vec![command]),
            inputs: vec![input],
            deadline: ctx.deadline,
        }
        .abi_encode()
        .into(),
    }
}

fn saturating_u128(value: U256) -> u128 {
    u128::try_from(value).unwrap_or(u128::MAX)
}

#[cfg(test)]
mod test {
    use {super::*, crate::domain::stable::StableAsset};

    fn ctx() -> SwapContext {
        SwapContext {
            filler: Address::repeat_byte(0xf1),
            router: Address::repeat_byte(0x66),
            weth: Address::repeat_byte(0x44),
            deadline: U256::from(1_700_000_120u64),
        }
    }

    fn usdc() -> SwapLeg {
        SwapLeg {
            asset: StableAsset::Usdc,
            erc20: Address::repeat_byte(0x33),
        }
    }

    fn dai() -> SwapLeg {
        SwapLeg {
            asset: StableAsset::Dai,
            erc20: Address::repeat_byte(0x11),
        }
    }

    fn native() -> SwapLeg {
        SwapLeg {
            asset: StableAsset::Native,
            erc20: Address::repeat_byte(0x44),
        }
    }

    fn decode_execute(call: &Call) -> contracts::UniversalRouter::executeCall {
        contracts::UniversalRouter::executeCall::abi_decode(&call.data).unwrap()
    }

    #[test]
    fn v2_erc20_to_erc20() {
        let best = BestProtocol {
            protocol: Protocol::V2,
            amount_in: U256::from(201_000_000u64),
            fee: None,
        };
        let calls = synthesize(&ctx(), usdc(), dai(), &best, U256::from(200));

        assert_eq!(calls.len(), 2);
        // funding transfer to the router, then the swap
        assert_eq!(calls[0].to, usdc().erc20);
        let execute = decode_execute(&calls[1]);
        assert_eq!(execute.commands.as_ref(), [V2_SWAP_EXACT_OUT]);
        assert_eq!(execute.deadline, ctx().deadline);
        assert_eq!(calls[1].value, U256::ZERO);

        let input =
            contracts::router::V2SwapExactOut::abi_decode(&execute.inputs[0]).unwrap();
        assert_eq!(input.path, vec![usdc().erc20, dai().erc20]);
        assert_eq!(input.recipient, ctx().filler);
        assert!(!input.payerIsUser);
    }

    #[test]
    fn v3_path_is_output_to_input() {
        let path = v3_path_exact_out(dai().erc20, 500, usdc().erc20);
        assert_eq!(path.len(), 43);
        assert_eq!(&path[..20], dai().erc20.as_slice());
        assert_eq!(&path[20..23], &[0x00, 0x01, 0xf4]);
        assert_eq!(&path[23..], usdc().erc20.as_slice());
    }

    #[test]
    fn v2_native_donor_wraps_first() {
        let best = BestProtocol {
            protocol: Protocol::V2,
            amount_in: U256::from(7),
            fee: None,
        };
        let calls = synthesize(&ctx(), native(), dai(), &best, U256::from(5));

        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].to, ctx().weth);
        assert_eq!(calls[0].value, best.amount_in);
        assert_eq!(
            calls[0].data.as_ref(),
            contracts::WETH9::depositCall {}.abi_encode()
        );
        assert_eq!(calls[1].to, ctx().weth); // WETH transfer to router
    }

    #[test]
    fn v3_native_target_unwraps_last() {
        let best = BestProtocol {
            protocol: Protocol::V3,
            amount_in: U256::from(7),
            fee: Some(3000),
        };
        let calls = synthesize(&ctx(), dai(), native(), &best, U256::from(5));

        assert_eq!(calls.len(), 3);
        let last = calls.last().unwrap();
        assert_eq!(last.to, ctx().weth);
        assert_eq!(
            last.data.as_ref(),
            contracts::WETH9::withdrawCall {
                wad: U256::from(5)
            }
            .abi_encode()
        );
    }

    #[test]
    fn v4_erc20_donor_transfers_then_executes() {
        let best = BestProtocol {
            protocol: Protocol::V4,
            amount_in: U256::from(201),
            fee: Some(500),
        };
        let calls = synthesize(&ctx(), usdc(), dai(), &best, U256::from(200));

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].to, usdc().erc20);
        let execute = decode_execute(&calls[1]);
        assert_eq!(execute.commands.as_ref(), [V4_SWAP]);
        assert_eq!(calls[1].value, U256::ZERO);

        let (actions, params) = <(Bytes, Vec<Bytes>)>::abi_decode(&execute.inputs[0]).unwrap();
        assert_eq!(
            actions.as_ref(),
            [SWAP_EXACT_OUT_SINGLE, SETTLE_ALL, TAKE_ALL]
        );
        assert_eq!(params.len(), 3);
        let swap =
            contracts::router::v4::ExactOutputSingleParams::abi_decode(&params[0]).unwrap();
        // dai (0x11..) < usdc (0x33..), and we're buying dai with usdc
        assert_eq!(swap.poolKey.currency0, dai().erc20);
        assert_eq!(swap.poolKey.currency1, usdc().erc20);
        assert!(!swap.zeroForOne);
        assert_eq!(i32::try_from(swap.poolKey.tickSpacing).unwrap(), 10);
    }

    #[test]
    fn v4_native_donor_passes_value() {
        let best = BestProtocol {
            protocol: Protocol::V4,
            amount_in: U256::from(42),
            fee: Some(100),
        };
        let calls = synthesize(&ctx(), native(), dai(), &best, U256::from(40));

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to, ctx().router);
        assert_eq!(calls[0].value, best.amount_in);

        let execute = decode_execute(&calls[0]);
        let (_, params) = <(Bytes, Vec<Bytes>)>::abi_decode(&execute.inputs[0]).unwrap();
        let swap =
            contracts::router::v4::ExactOutputSingleParams::abi_decode(&params[0]).unwrap();
        // native sorts first as the zero currency
        assert_eq!(swap.poolKey.currency0, Address::ZERO);
        assert!(swap.zeroForOne);
    }
}
