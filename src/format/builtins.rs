/*!

The built-in namespace.

Namespace 1 holds one container per primitive kind. Each container is a record with a single
field, `value`. Its bodies use the same structural encoding as any other record.

| Schema id  | Number | Version | Container        | Value on the wire                           |
| --         | --     | --      | --               | --                                          |
| 0x000101   | 1      | 1       | `BasicString`    | UTF-8 string                                |
| 0x000201   | 2      | 1       | `BasicInt`       | Signed 64-bit integer                       |
| 0x000301   | 3      | 1       | `BasicBytes`     | Byte string                                 |
| 0x000401   | 4      | 1       | `BasicMap`       | Map from strings to dynamic values          |
| 0x000501   | 5      | 1       | `BasicTimestamp` | Signed milliseconds since the Unix epoch, UTC |
| 0x000601   | 6      | 1       | `BasicDecimal`   | Decimal in its string form, e.g. `"3.14"`  |

Timestamps lose anything finer than a millisecond. Dynamic values inside a map can be null,
booleans, signed 64-bit integers, 64-bit floats, strings, byte strings, arrays, and nested maps.

*/
