//! `alloy::sol!` bindings for every onchain surface the filler consumes.
//!
//! The interfaces are intentionally narrow: only the functions, events and
//! structs that are actually called appear here.

pub use alloy::providers::DynProvider as Provider;

alloy::sol! {
    #[allow(missing_docs, clippy::too_many_arguments)]
    #[sol(rpc)]
    #[derive(Debug, PartialEq, Eq)]
    contract IntentGateway {
        /// An input escrowed on the source chain.
        struct PaymentInfo {
            bytes32 token;
            uint256 amount;
        }

        /// An output owed on the destination chain.
        struct TokenInfo {
            bytes32 token;
            uint256 amount;
            bytes32 beneficiary;
        }

        struct Order {
            bytes32 user;
            bytes sourceChain;
            bytes destChain;
            uint256 deadline;
            uint256 nonce;
            uint256 fees;
            TokenInfo[] outputs;
            PaymentInfo[] inputs;
            bytes callData;
        }

        struct FillOptions {
            uint256 relayerFee;
        }

        event OrderPlaced(
            bytes32 user,
            bytes sourceChain,
            bytes destChain,
            uint256 deadline,
            uint256 nonce,
            uint256 fees,
            TokenInfo[] outputs,
            PaymentInfo[] inputs,
            bytes callData
        );

        function fillOrder(Order calldata order, FillOptions calldata options) external payable;
    }
}

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract IsmpHost {
        struct HostParams {
            uint256 defaultTimeout;
            uint256 defaultPerByteFee;
            address feeToken;
        }

        function nonce() external view returns (uint256);
        function perByteFee(bytes calldata stateId) external view returns (uint256);
        function hostParams() external view returns (HostParams memory);
    }
}

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract ERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string memory);
    }
}

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract WETH9 {
        function deposit() external payable;
        function withdraw(uint256 wad) external;
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address);
    }
}

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract IUniswapV2Router02 {
        function getAmountsIn(uint256 amountOut, address[] calldata path)
            external
            view
            returns (uint256[] memory amounts);
    }
}

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract IUniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address);
    }
}

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract IUniswapV3Pool {
        function liquidity() external view returns (uint128);
    }
}

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract IQuoterV2 {
        struct QuoteExactOutputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amount;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        // Not a view function. Quoters revert with the quote encoded in the
        // revert data, so this must go through call simulation.
        function quoteExactOutputSingle(QuoteExactOutputSingleParams memory params)
            external
            returns (
                uint256 amountIn,
                uint160 sqrtPriceX96After,
                uint32 initializedTicksCrossed,
                uint256 gasEstimate
            );
    }
}

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug, PartialEq, Eq)]
    contract IV4Quoter {
        struct PoolKey {
            address currency0;
            address currency1;
            uint24 fee;
            int24 tickSpacing;
            address hooks;
        }

        struct QuoteExactSingleParams {
            PoolKey poolKey;
            bool zeroForOne;
            uint128 exactAmount;
            bytes hookData;
        }

        function quoteExactOutputSingle(QuoteExactSingleParams memory params)
            external
            returns (uint256 amountIn, uint256 gasEstimate);
    }
}

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract UniversalRouter {
        function execute(bytes calldata commands, bytes[] calldata inputs, uint256 deadline)
            external
            payable;
    }
}

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug, PartialEq, Eq)]
    contract BatchExecutor {
        struct Call {
            address to;
            uint256 value;
            bytes data;
        }

        function execute(Call[] calldata calls) external payable;
    }
}

/// ABI types for the universal router's command inputs. These are not a
/// contract interface; the router decodes its `inputs` array with these
/// layouts depending on the command byte.
pub mod router {
    alloy::sol! {
        #[allow(missing_docs)]
        #[derive(Debug, PartialEq, Eq)]
        struct V2SwapExactOut {
            address recipient;
            uint256 amountOut;
            uint256 amountInMax;
            address[] path;
            bool payerIsUser;
        }

        #[allow(missing_docs)]
        #[derive(Debug, PartialEq, Eq)]
        struct V3SwapExactOut {
            address recipient;
            uint256 amountOut;
            uint256 amountInMax;
            bytes path;
            bool payerIsUser;
        }
    }

    /// The `V4_SWAP` command carries `(bytes actions, bytes[] params)` where
    /// each action byte has its own params layout.
    pub mod v4 {
        alloy::sol! {
            #[allow(missing_docs)]
            #[derive(Debug, PartialEq, Eq)]
            struct PoolKey {
                address currency0;
                address currency1;
                uint24 fee;
                int24 tickSpacing;
                address hooks;
            }

            #[allow(missing_docs)]
            #[derive(Debug, PartialEq, Eq)]
            struct ExactOutputSingleParams {
                PoolKey poolKey;
                bool zeroForOne;
                uint128 amountOut;
                uint128 amountInMaximum;
                bytes hookData;
            }
        }
    }
}

/// The instance types used across the filler, all over a type-erased
/// provider.
pub mod instances {
    use super::*;

    pub type IntentGatewayInstance = IntentGateway::IntentGatewayInstance<Provider>;
    pub type IsmpHostInstance = IsmpHost::IsmpHostInstance<Provider>;
    pub type Erc20Instance = ERC20::ERC20Instance<Provider>;
    pub type Weth9Instance = WETH9::WETH9Instance<Provider>;
    pub type UniswapV2FactoryInstance = IUniswapV2Factory::IUniswapV2FactoryInstance<Provider>;
    pub type UniswapV2RouterInstance = IUniswapV2Router02::IUniswapV2Router02Instance<Provider>;
    pub type UniswapV3FactoryInstance = IUniswapV3Factory::IUniswapV3FactoryInstance<Provider>;
    pub type UniswapV3PoolInstance = IUniswapV3Pool::IUniswapV3PoolInstance<Provider>;
    pub type QuoterV2Instance = IQuoterV2::IQuoterV2Instance<Provider>;
    pub type V4QuoterInstance = IV4Quoter::IV4QuoterInstance<Provider>;
    pub type UniversalRouterInstance = UniversalRouter::UniversalRouterInstance<Provider>;
    pub type BatchExecutorInstance = BatchExecutor::BatchExecutorInstance<Provider>;
}
